//! Block height to wall-clock estimation.

/// Nominal block interval of the chain, in seconds.
pub const BLOCK_TIME_SECS: i64 = 6;

/// The latest observed (block, unix time) pair, used as the anchor for
/// estimating the wall-clock time of any other block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAndTime {
    pub block: u64,
    /// Unix time in seconds at which `block` was observed.
    pub time: i64,
}

/// Estimate the unix time at which `block` was (or will be) produced,
/// relative to a known anchor.
pub fn estimate_time_at_block(block: u64, known: &BlockAndTime) -> i64 {
    let delta = block as i64 - known.block as i64;
    known.time + delta * BLOCK_TIME_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_forward() {
        let known = BlockAndTime { block: 100, time: 1_000_000 };
        assert_eq!(estimate_time_at_block(100, &known), 1_000_000);
        assert_eq!(estimate_time_at_block(110, &known), 1_000_060);
    }

    #[test]
    fn test_estimate_backward() {
        let known = BlockAndTime { block: 100, time: 1_000_000 };
        assert_eq!(estimate_time_at_block(90, &known), 999_940);
    }
}
