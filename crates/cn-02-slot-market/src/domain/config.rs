//! Slot market configuration.

/// Slot market limits
#[derive(Debug, Clone)]
pub struct SlotMarketConfig {
    /// Ceiling on the aggregate count of remote slots held at once
    pub max_free_slots: u32,
    /// Largest slot count accepted from a single advertisement
    pub max_slots_per_advertisement: u32,
    /// Re-query once the free count falls to `high_water_mark / refill_divisor`
    pub refill_divisor: u32,
}

impl Default for SlotMarketConfig {
    fn default() -> Self {
        Self {
            max_free_slots: 200,
            max_slots_per_advertisement: 16,
            refill_divisor: 4,
        }
    }
}

impl SlotMarketConfig {
    /// Testing config with smaller limits
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        Self {
            max_free_slots: 20,
            max_slots_per_advertisement: 8,
            refill_divisor: 4,
        }
    }
}
