//! # Group Membership Proofs
//!
//! A responder proves membership of group `G` to a querier by signing
//!
//! ```text
//! signed_text = DER(querier public key) || DER(responder public key)
//! ```
//!
//! with `G`'s private key and presenting `G`'s public key alongside. The
//! querier accepts the proof only if:
//!
//! 1. the group key decodes and is in its trusted-group list
//! 2. the signed text is exactly `DER(own key) || DER(sender key)`
//! 3. the signature verifies under the group key
//!
//! Rule 2 binds the proof to one peer pair: a relay that forwards a proof
//! made for someone else fails it.

use cn_01_trust_store::{TrustStore, TrustedGroup};
use shared_crypto::{PrivateKey, PublicKey};
use thiserror::Error;

/// Proof carried in `GroupNetworkResourcesAvailable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipProof {
    pub group_key: Vec<u8>,
    pub signed_text: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Why a proof was not accepted. Never reported to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProofRejection {
    #[error("group key is not a valid DER public key")]
    MalformedGroupKey,
    #[error("group is not trusted")]
    UntrustedGroup,
    #[error("signed text is not bound to this peer pair")]
    TextMismatch,
    #[error("signature does not verify under the group key")]
    BadSignature,
}

fn pair_text(querier: &PublicKey, responder: &PublicKey) -> Vec<u8> {
    let mut text = querier.to_der();
    text.extend_from_slice(&responder.to_der());
    text
}

impl MembershipProof {
    /// Build the proof `responder` sends back to `querier`.
    pub fn create(
        group_key: &PublicKey,
        group_private_key: &PrivateKey,
        querier: &PublicKey,
        responder: &PublicKey,
    ) -> Self {
        let signed_text = pair_text(querier, responder);
        let signature = group_private_key.sign(&signed_text);
        Self {
            group_key: group_key.to_der(),
            signed_text,
            signature,
        }
    }

    /// Check a proof received from `responder` by the node owning `trust`.
    pub fn verify<'a>(
        &self,
        trust: &'a TrustStore,
        responder: &PublicKey,
    ) -> Result<&'a TrustedGroup, ProofRejection> {
        let group_key =
            PublicKey::from_der(&self.group_key).map_err(|_| ProofRejection::MalformedGroupKey)?;
        let group = trust
            .trusted_group(&group_key)
            .ok_or(ProofRejection::UntrustedGroup)?;

        if self.signed_text != pair_text(trust.public_key(), responder) {
            return Err(ProofRejection::TextMismatch);
        }

        group_key
            .verify(&self.signed_text, &self.signature)
            .map_err(|_| ProofRejection::BadSignature)?;
        Ok(group)
    }
}

/// Among the first `cap` queried group keys, find the first one this node
/// holds a membership for. A key that does not decode ends the scan.
pub fn select_membership<'a, K: AsRef<[u8]>>(
    trust: &'a TrustStore,
    queried_keys: &[K],
    cap: usize,
) -> Option<(PublicKey, &'a PrivateKey)> {
    for der in queried_keys.iter().take(cap) {
        let key = PublicKey::from_der(der.as_ref()).ok()?;
        if let Some(membership) = trust.membership_for(&key) {
            return Some((key, &membership.private_key));
        }
    }
    None
}
