//! Bit set flags used in Databento market data.

/// Indicates it's the last record in the event from the venue for a given
/// `instrument_id`.
pub const LAST: u8 = 1 << 7;
/// Indicates a top-of-book record, not an individual order.
pub const TOB: u8 = 1 << 6;
/// Indicates the record was sourced from a replay, such as a snapshot server.
pub const SNAPSHOT: u8 = 1 << 5;
/// Indicates an aggregated price level record, not an individual order.
pub const MBP: u8 = 1 << 4;
/// Indicates the `ts_recv` value is inaccurate due to clock issues or packet
/// reordering.
pub const BAD_TS_RECV: u8 = 1 << 3;

/// Returns `true` if every bit of `flag` is set in `flags`.
pub const fn is_set(flags: u8, flag: u8) -> bool {
    flags & flag == flag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_set() {
        let flags = LAST | SNAPSHOT;
        assert!(is_set(flags, LAST));
        assert!(is_set(flags, SNAPSHOT));
        assert!(!is_set(flags, TOB));
        assert!(!is_set(flags, LAST | TOB));
    }
}
