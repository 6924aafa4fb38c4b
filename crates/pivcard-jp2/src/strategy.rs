//! Encoding strategies: how to pick the JPEG 2000 quality rate(s) to try.

use thiserror::Error;

use crate::table::{self, TABLE};

/// How an encode's target quality/size is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncodingStrategy {
    /// Encode once at a fixed bits/pixel rate. Never retries.
    FixedRate { rate: f32 },
    /// Search the compression-rate table for a rate that lands the encoded size at or under
    /// `target_bytes`, retrying at most `max_retries` additional times.
    TargetSize { target_bytes: u32 },
}

#[derive(Debug, Error, PartialEq)]
pub enum StrategyError {
    #[error("could not encode under the target size of {target_bytes} bytes within the retry budget")]
    TargetSizeUnachievable { target_bytes: u32 },
}

/// A single encode attempt and its outcome, recorded for diagnostics.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub rate: f32,
    pub encoded_bytes: usize,
}

/// Outcome of running a strategy to completion: the winning bytes plus every attempt made.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub bytes: Vec<u8>,
    pub attempts: Vec<Attempt>,
}

/// Runs `strategy` to completion, calling `encode_at_rate` once per attempt.
///
/// `encode_at_rate` is injected so this module's search logic is testable without the real
/// `openjp2` encoder; [`crate::encoder`] supplies the production closure.
pub fn run(
    strategy: EncodingStrategy,
    max_retries: u32,
    mut encode_at_rate: impl FnMut(f32) -> anyhow::Result<Vec<u8>>,
) -> anyhow::Result<StrategyOutcome> {
    match strategy {
        EncodingStrategy::FixedRate { rate } => {
            let bytes = encode_at_rate(rate)?;
            let attempts = vec![Attempt { rate, encoded_bytes: bytes.len() }];
            Ok(StrategyOutcome { bytes, attempts })
        }
        EncodingStrategy::TargetSize { target_bytes } => {
            target_size_search(target_bytes, max_retries, &mut encode_at_rate)
        }
    }
}

/// The "Price-Is-Right" search: look up the highest table rate whose expected size is under 95%
/// of the target, then bracket it with `max_retries` additional attempts (split between higher
/// and lower rates) until one encode lands at or under `target_bytes`.
fn target_size_search(
    target_bytes: u32,
    max_retries: u32,
    encode_at_rate: &mut impl FnMut(f32) -> anyhow::Result<Vec<u8>>,
) -> anyhow::Result<StrategyOutcome> {
    let effective_target = (target_bytes as f32 * 0.95) as u32;
    let i_star = table::highest_rate_under(effective_target).map(|(i, _)| i).unwrap_or(0);

    let mut attempts = Vec::new();

    if max_retries == 0 {
        let rate = TABLE[i_star].rate;
        let bytes = encode_at_rate(rate)?;
        attempts.push(Attempt { rate, encoded_bytes: bytes.len() });
        return Ok(StrategyOutcome { bytes, attempts });
    }

    let n = max_retries as usize + 1;
    let n_high = n / 2;
    let n_low = n - n_high;

    let hi_end = (i_star + n_high).min(TABLE.len() - 1);
    let mut indices: Vec<usize> = (i_star..=hi_end).rev().collect();
    let lo_start = i_star.saturating_sub(n_low.saturating_sub(1));
    if lo_start < i_star {
        indices.extend((lo_start..i_star).rev());
    }

    for index in indices {
        let rate = TABLE[index].rate;
        let bytes = encode_at_rate(rate)?;
        attempts.push(Attempt { rate, encoded_bytes: bytes.len() });
        if bytes.len() as u32 <= target_bytes {
            return Ok(StrategyOutcome { bytes, attempts });
        }
    }

    Err(StrategyError::TargetSizeUnachievable { target_bytes }.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_encoder(sizes: std::collections::HashMap<u32, usize>) -> impl FnMut(f32) -> anyhow::Result<Vec<u8>> {
        move |rate: f32| {
            let key = (rate * 1000.0).round() as u32;
            let size = *sizes.get(&key).unwrap_or(&100_000);
            Ok(vec![0u8; size])
        }
    }

    #[test]
    fn fixed_rate_never_retries() {
        let mut calls = 0;
        let outcome = run(EncodingStrategy::FixedRate { rate: 0.70 }, 2, |rate| {
            calls += 1;
            assert_eq!(rate, 0.70);
            Ok(vec![0u8; 21_300])
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(outcome.attempts.len(), 1);
    }

    #[test]
    fn target_size_with_zero_retries_returns_best_effort_regardless_of_size() {
        let outcome = run(EncodingStrategy::TargetSize { target_bytes: 1_000 }, 0, |_rate| Ok(vec![0u8; 50_000])).unwrap();
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.bytes.len(), 50_000);
    }

    #[test]
    fn target_size_search_succeeds_within_retry_budget() {
        // encoder reports the table's own expected size for whatever rate is requested
        let outcome = run(EncodingStrategy::TargetSize { target_bytes: 20_000 }, 4, |rate| {
            Ok(vec![0u8; table::expected_size_for_rate(rate) as usize])
        })
        .unwrap();
        assert!(outcome.bytes.len() as u32 <= 20_000);
        assert!(outcome.attempts.len() <= 5);
    }

    #[test]
    fn target_size_search_fails_when_unachievable() {
        // every attempt reports an oversized encode; the search must exhaust its budget and fail
        let result = run(EncodingStrategy::TargetSize { target_bytes: 100 }, 2, |_rate| Ok(vec![0u8; 999_999]));
        assert!(result.is_err());
    }

    #[test]
    fn target_size_search_visits_at_most_max_retries_plus_one_rates() {
        let mut seen = Vec::new();
        let _ = run(EncodingStrategy::TargetSize { target_bytes: 5 }, 3, |rate| {
            seen.push(rate);
            Ok(vec![0u8; 999_999])
        });
        assert_eq!(seen.len(), 4);
    }
}
