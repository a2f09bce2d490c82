//! # Group Trust Across Nodes
//!
//! Slot queries addressed to trusted groups, membership proofs bound to the
//! querier/responder pair, and status reports listing memberships.

#[cfg(test)]
mod tests {
    use cn_03_job_exchange::{
        Job, JobExchangeApi, JobExchangeConfig, JobExchangeEvent, Toolchain,
    };
    use shared_crypto::{PrivateKey, PublicKey};

    use crate::harness::SimNetwork;

    const ALICE: usize = 0;
    const BOB: usize = 1;
    const CAROL: usize = 2;
    const MALLORY: usize = 3;

    fn group_key(seed: u8) -> PrivateKey {
        PrivateKey::from_seed([seed; 32])
    }

    fn network() -> SimNetwork {
        let mut net = SimNetwork::new(
            &["alice", "bob", "carol", "mallory"],
            JobExchangeConfig::for_testing(),
        );
        for executor in [BOB, CAROL, MALLORY] {
            net.node(executor)
                .service
                .set_toolchains(vec![Toolchain::new("x86_64-gcc-4.6.3", "/opt/gcc/bin/gcc")]);
            net.node(executor).service.set_free_local_slots(4);
        }
        net.node(ALICE).files.insert("/src/main.c", b"int x;".to_vec());
        net
    }

    fn job() -> Job {
        Job::new(Toolchain::new("x86_64-gcc-4.6", "/usr/bin/gcc"), "c")
            .with_files(vec!["main.c".into()], vec!["main.o".into()])
            .with_working_dir("/src")
    }

    // =========================================================================
    // TEST GROUP 1: QUERY CAP
    // =========================================================================

    #[test]
    fn test_only_first_sixteen_groups_are_queried() {
        let mut net = network();

        let groups: Vec<PrivateKey> = (100..120).map(group_key).collect();
        for (i, group) in groups.iter().enumerate() {
            net.node(ALICE)
                .service
                .add_trusted_group(format!("team-{i}"), group.public_key());
        }
        // The query lists keys in the trust store's key order.
        let mut sorted: Vec<&PrivateKey> = groups.iter().collect();
        sorted.sort_by_key(|k| k.public_key());
        let first = sorted[0].clone();
        let last = sorted[19].clone();

        net.node(BOB).service.add_group_membership("team".into(), first);
        net.node(CAROL).service.add_group_membership("team".into(), last);
        net.link(ALICE, BOB).unwrap();
        net.link(ALICE, CAROL).unwrap();

        net.node(ALICE).service.submit_job(job()).unwrap();
        let query = net.node(ALICE).transport.take_broadcasts();
        match &query[..] {
            [cn_03_job_exchange::wire::Packet::QueryGroupNetworkResources { group_keys }] => {
                assert_eq!(group_keys.len(), 16);
                let frame = query[0].encode().unwrap();
                for to in [BOB, CAROL] {
                    net.deliver(ALICE, to, frame.clone()).unwrap();
                }
            }
            other => panic!("unexpected broadcasts {other:?}"),
        }
        net.pump().unwrap();

        assert_eq!(net.node(BOB).service.incoming_requests(), 1);
        assert_eq!(net.node(CAROL).service.incoming_requests(), 0);
    }

    // =========================================================================
    // TEST GROUP 2: PROOF BINDING
    // =========================================================================

    /// Alice trusts group 9, Bob is a member. Returns Bob's answer to
    /// Alice's query without delivering it.
    fn bobs_answer(net: &mut SimNetwork) -> bytes::Bytes {
        net.node(ALICE)
            .service
            .add_trusted_group("office".into(), group_key(9).public_key());
        net.node(BOB)
            .service
            .add_group_membership("office".into(), group_key(9));
        net.link(ALICE, BOB).unwrap();
        net.link(ALICE, MALLORY).unwrap();

        net.node(ALICE).service.submit_job(job()).unwrap();
        for (to, frame) in net.outbox(ALICE) {
            if to == BOB {
                net.deliver(ALICE, BOB, frame).unwrap();
            }
        }
        let mut answers = net.outbox(BOB);
        assert_eq!(answers.len(), 1);
        answers.remove(0).1
    }

    #[test]
    fn test_relayed_proof_rejected() {
        let mut net = network();
        let answer = bobs_answer(&mut net);

        // Mallory replays Bob's proof as her own.
        net.deliver(MALLORY, ALICE, answer.clone()).unwrap();
        assert_eq!(net.node(ALICE).service.outstanding_requests(), 0);
        assert_eq!(net.node(ALICE).service.slot_market().free_slot_count(), 0);

        // The genuine answer still works.
        net.deliver(BOB, ALICE, answer).unwrap();
        assert_eq!(net.node(ALICE).service.outstanding_requests(), 1);
    }

    #[test]
    fn test_proof_for_other_querier_rejected() {
        let mut net = network();
        let answer = bobs_answer(&mut net);

        // Carol trusts the same group but the proof names Alice.
        net.node(CAROL)
            .service
            .add_trusted_group("office".into(), group_key(9).public_key());
        net.link(BOB, CAROL).unwrap();
        net.node(CAROL).service.submit_job(job()).unwrap();
        net.node(CAROL).transport.take_broadcasts();

        net.deliver(BOB, CAROL, answer).unwrap();
        assert_eq!(net.node(CAROL).service.outstanding_requests(), 0);
    }

    #[test]
    fn test_group_dropped_before_answer_arrives() {
        let mut net = network();
        let answer = bobs_answer(&mut net);

        net.node(ALICE)
            .service
            .remove_trusted_group(&group_key(9).public_key());
        net.deliver(BOB, ALICE, answer).unwrap();
        assert_eq!(net.node(ALICE).service.outstanding_requests(), 0);
    }

    // =========================================================================
    // TEST GROUP 3: STATUS
    // =========================================================================

    #[test]
    fn test_status_report_lists_memberships() {
        let mut net = network();
        let office: PublicKey = group_key(9).public_key();
        net.node(BOB)
            .service
            .add_group_membership("office".into(), group_key(9));
        net.link(ALICE, BOB).unwrap();
        net.node(ALICE).events.take();

        net.node(ALICE).service.query_network_status();
        net.pump().unwrap();

        let reports: Vec<_> = net
            .node(ALICE)
            .events
            .take()
            .into_iter()
            .filter_map(|e| match e {
                JobExchangeEvent::NodeStatusReceived(report) => Some(report),
                _ => None,
            })
            .collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].peer_name, "bob");
        assert_eq!(reports[0].peer, SimNetwork::peer_id(BOB));
        assert_eq!(reports[0].groups.len(), 1);
        assert_eq!(reports[0].groups[0].public_key, office);
        assert_eq!(reports[0].groups[0].name, "office");
    }
}
