//! Empirical compression-rate table for a 420x560 output frame.
//!
//! This table is calibrated against one specific encoder build (see the Price-Is-Right search in
//! [`crate::strategy`]); if the underlying encoder changes, the table should be re-measured or
//! the target-size strategy may oscillate between rates that no longer bracket the true size.

/// One calibration point: a bits/pixel rate, its observed encoded size for a 420x560 frame, and a
/// human-readable note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateEntry {
    pub rate: f32,
    pub expected_bytes: u32,
    pub description: &'static str,
}

/// Rows are ordered ascending by rate; both `rate` and `expected_bytes` are monotone
/// non-decreasing, a property verified by this module's tests.
pub const TABLE: &[RateEntry] = &[
    RateEntry { rate: 0.35, expected_bytes: 11_400, description: "aggressive, visible blocking" },
    RateEntry { rate: 0.36, expected_bytes: 11_800, description: "TWIC floor" },
    RateEntry { rate: 0.40, expected_bytes: 13_000, description: "" },
    RateEntry { rate: 0.45, expected_bytes: 14_600, description: "TWIC max target" },
    RateEntry { rate: 0.50, expected_bytes: 16_200, description: "" },
    RateEntry { rate: 0.55, expected_bytes: 17_700, description: "" },
    RateEntry { rate: 0.60, expected_bytes: 19_100, description: "" },
    RateEntry { rate: 0.65, expected_bytes: 20_200, description: "" },
    RateEntry { rate: 0.68, expected_bytes: 20_600, description: "" },
    RateEntry { rate: 0.70, expected_bytes: 21_300, description: "PIV balanced default" },
    RateEntry { rate: 0.75, expected_bytes: 22_900, description: "" },
    RateEntry { rate: 0.80, expected_bytes: 24_500, description: "" },
    RateEntry { rate: 0.85, expected_bytes: 26_100, description: "" },
    RateEntry { rate: 0.90, expected_bytes: 27_800, description: "" },
    RateEntry { rate: 0.96, expected_bytes: 29_400, description: "" },
    RateEntry { rate: 1.10, expected_bytes: 33_600, description: "" },
    RateEntry { rate: 1.40, expected_bytes: 42_100, description: "" },
    RateEntry { rate: 1.90, expected_bytes: 54_800, description: "" },
    RateEntry { rate: 2.50, expected_bytes: 69_900, description: "archival" },
];

/// Returns the highest rate whose expected size is `<= target_bytes`, along with its index in
/// [`TABLE`]. Returns `None` if even the lowest rate overshoots the target.
pub fn highest_rate_under(target_bytes: u32) -> Option<(usize, RateEntry)> {
    TABLE
        .iter()
        .enumerate()
        .rev()
        .find(|(_, entry)| entry.expected_bytes <= target_bytes)
        .map(|(i, entry)| (i, *entry))
}

/// Expected byte size for an arbitrary `rate`, linearly interpolated between the two bracketing
/// table rows, or linearly extrapolated from the two nearest rows if `rate` lies outside the
/// table's range.
pub fn expected_size_for_rate(rate: f32) -> u32 {
    if TABLE.len() < 2 {
        return TABLE.first().map(|e| e.expected_bytes).unwrap_or(0);
    }

    if rate <= TABLE[0].rate {
        return extrapolate(TABLE[0], TABLE[1], rate);
    }
    if rate >= TABLE[TABLE.len() - 1].rate {
        return extrapolate(TABLE[TABLE.len() - 2], TABLE[TABLE.len() - 1], rate);
    }

    for window in TABLE.windows(2) {
        let (lo, hi) = (window[0], window[1]);
        if rate >= lo.rate && rate <= hi.rate {
            let t = (rate - lo.rate) / (hi.rate - lo.rate);
            let bytes = lo.expected_bytes as f32 + t * (hi.expected_bytes as f32 - lo.expected_bytes as f32);
            return bytes.round() as u32;
        }
    }

    unreachable!("rate {rate} did not fall within or outside the table bounds")
}

fn extrapolate(a: RateEntry, b: RateEntry, rate: f32) -> u32 {
    let slope = (b.expected_bytes as f32 - a.expected_bytes as f32) / (b.rate - a.rate);
    let bytes = a.expected_bytes as f32 + slope * (rate - a.rate);
    bytes.max(0.0).round() as u32
}

/// Returns the index of `rate` in [`TABLE`], if it matches a row exactly (within floating-point
/// tolerance).
pub fn index_of_rate(rate: f32) -> Option<usize> {
    TABLE.iter().position(|entry| (entry.rate - rate).abs() < 1e-4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_monotone_non_decreasing() {
        for window in TABLE.windows(2) {
            assert!(window[1].rate >= window[0].rate);
            assert!(window[1].expected_bytes >= window[0].expected_bytes);
        }
    }

    #[test]
    fn highest_rate_under_finds_largest_fitting_row() {
        let (_, entry) = highest_rate_under(20_000).unwrap();
        assert!(entry.expected_bytes <= 20_000);
        let next_index = TABLE.iter().position(|e| e.rate == entry.rate).unwrap() + 1;
        if let Some(next) = TABLE.get(next_index) {
            assert!(next.expected_bytes > 20_000);
        }
    }

    #[test]
    fn highest_rate_under_returns_none_below_floor() {
        assert!(highest_rate_under(1_000).is_none());
    }

    #[test]
    fn expected_size_interpolates_between_rows() {
        let size = expected_size_for_rate(0.455);
        // halfway between rate 0.45 (14_600) and 0.50 (16_200)
        assert!((size as i64 - 15_400).abs() <= 5);
    }

    #[test]
    fn expected_size_extrapolates_below_table() {
        let size = expected_size_for_rate(0.20);
        assert!(size < TABLE[0].expected_bytes);
    }

    #[test]
    fn index_of_rate_matches_table_row() {
        assert_eq!(index_of_rate(0.70), TABLE.iter().position(|e| e.rate == 0.70));
    }
}
