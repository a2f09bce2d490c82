use shared_types::{is_compatible, PeerId};

/// One advertisement: `slot_count` free slots on `node` for any of the
/// listed toolchain versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeCompilerSlots {
    pub node: PeerId,
    pub slot_count: u32,
    pub toolchain_versions: Vec<String>,
}

impl FreeCompilerSlots {
    pub fn new(node: PeerId, slot_count: u32, toolchain_versions: Vec<String>) -> Self {
        Self {
            node,
            slot_count,
            toolchain_versions,
        }
    }

    /// Whether a job built for `toolchain` can run on one of these slots.
    pub fn supports(&self, toolchain: &str) -> bool {
        self.toolchain_versions
            .iter()
            .any(|available| is_compatible(toolchain, available))
    }
}

/// Result of [`SlotMarket::record`](super::SlotMarket::record).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The batch was stored with `accepted` slots (possibly fewer than
    /// advertised).
    Recorded { accepted: u32 },
    /// Zero-size advertisement.
    IgnoredEmpty,
    /// The market is already at its ceiling.
    RejectedCeiling,
}
