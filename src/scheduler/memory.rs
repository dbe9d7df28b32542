//! FSRS-shaped memory model: the numeric policy behind the scheduler.
//!
//! The structural contract is fixed (stability grows boundedly on success,
//! resets downward on failure; difficulty is a bounded adjustment; the
//! next interval follows from stability and a target retention), while the
//! weight vector itself is pluggable per deployment via [`MemoryParams`].

use serde::{Deserialize, Serialize};

const DECAY: f64 = -0.5;
const FACTOR: f64 = 19.0 / 81.0;

const MIN_STABILITY: f64 = 0.1;
const MIN_DIFFICULTY: f64 = 1.0;
const MAX_DIFFICULTY: f64 = 10.0;
const MAX_INTERVAL_DAYS: f64 = 36500.0;

/// Weight vector for the memory model.
///
/// Serde-able so deployments can persist tuned weights; the default set
/// is a reasonable untuned baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryParams {
    pub w: [f64; 17],
}

impl Default for MemoryParams {
    fn default() -> Self {
        Self {
            w: [
                0.4, 0.6, 2.4, 5.8, // w0-w3: initial stability per rating
                4.93, 0.94, 0.86, 0.01, 1.49, // w4-w8
                0.14, 0.94, 2.18, 0.05, 0.34, // w9-w13
                1.26, 0.29, 2.61, // w14-w16
            ],
        }
    }
}

/// Probability of recall after `elapsed_days` at the given stability.
pub fn retrievability(stability: f64, elapsed_days: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    let safe_elapsed = elapsed_days.max(0.0);
    (1.0 + FACTOR * safe_elapsed / stability).powf(DECAY)
}

/// Interval (in fractional days) at which recall probability decays to
/// `desired_retention`. Clamped to [1, 36500] days.
pub fn next_interval(stability: f64, desired_retention: f64) -> f64 {
    let safe_retention = desired_retention.clamp(0.0001, 0.9999);
    let interval = stability / FACTOR * (safe_retention.powf(1.0 / DECAY) - 1.0);
    interval.clamp(1.0, MAX_INTERVAL_DAYS)
}

/// Stability seeded by the first rating a card ever receives.
pub fn initial_stability(params: &MemoryParams, rating: i32) -> f64 {
    params.w[(rating - 1) as usize].max(MIN_STABILITY)
}

/// Difficulty seeded by the first rating, clamped into [1, 10].
pub fn initial_difficulty(params: &MemoryParams, rating: i32) -> f64 {
    let d = params.w[4] - (rating - 3) as f64 * params.w[5];
    d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// Bounded difficulty adjustment: Good holds, Easy lowers, Hard and Again
/// raise, with mean reversion so difficulty does not drift to the rails.
pub fn next_difficulty(params: &MemoryParams, difficulty: f64, rating: i32) -> f64 {
    let w = &params.w;
    let delta = -(rating - 3) as f64;
    let adjusted = difficulty + w[6] * delta;
    let target = w[4] - 3.0 * w[5];
    let reverted = w[7] * target + (1.0 - w[7]) * adjusted;
    reverted.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// Stability growth after a successful review. Growth is superlinear in
/// how far recall had decayed, damped by difficulty and current stability,
/// with a penalty for Hard and a bonus for Easy.
pub fn next_recall_stability(
    params: &MemoryParams,
    difficulty: f64,
    stability: f64,
    recall: f64,
    rating: i32,
) -> f64 {
    let w = &params.w;
    let hard_penalty = if rating == 2 { w[15] } else { 1.0 };
    let easy_bonus = if rating == 4 { w[16] } else { 1.0 };

    let grown = stability
        * (1.0
            + w[8].exp()
                * (11.0 - difficulty)
                * stability.powf(-w[9])
                * ((1.0 - recall) * w[10]).exp_m1()
                * hard_penalty
                * easy_bonus);
    grown.max(MIN_STABILITY)
}

/// Post-lapse stability. Always lands strictly below the prior stability
/// (clamped to it) so a forgotten card never keeps its old interval.
pub fn next_forget_stability(
    params: &MemoryParams,
    difficulty: f64,
    stability: f64,
    recall: f64,
) -> f64 {
    let w = &params.w;
    let reset = w[11]
        * difficulty.powf(-w[12])
        * ((stability + 1.0).powf(w[13]) - 1.0)
        * (w[14] * (1.0 - recall)).exp();
    reset.clamp(MIN_STABILITY, stability)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrievability_decays_from_one() {
        let r_0 = retrievability(10.0, 0.0);
        let r_5 = retrievability(10.0, 5.0);
        let r_10 = retrievability(10.0, 10.0);
        assert!((r_0 - 1.0).abs() < 1e-9);
        assert!(r_0 > r_5);
        assert!(r_5 > r_10);
    }

    #[test]
    fn retrievability_handles_degenerate_inputs() {
        assert_eq!(retrievability(0.0, 5.0), 0.0);
        // Negative elapsed (clock skew) reads as "just reviewed".
        assert!((retrievability(10.0, -3.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn initial_stability_orders_by_rating() {
        let params = MemoryParams::default();
        let again = initial_stability(&params, 1);
        let hard = initial_stability(&params, 2);
        let good = initial_stability(&params, 3);
        let easy = initial_stability(&params, 4);
        assert!(again < hard && hard < good && good < easy);
    }

    #[test]
    fn difficulty_stays_bounded() {
        let params = MemoryParams::default();
        let mut d = initial_difficulty(&params, 1);
        // Hammer with Again: difficulty rises but never leaves [1, 10].
        for _ in 0..100 {
            d = next_difficulty(&params, d, 1);
            assert!((MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&d));
        }
        // Then hammer with Easy: falls but stays bounded.
        for _ in 0..100 {
            d = next_difficulty(&params, d, 4);
            assert!((MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&d));
        }
    }

    #[test]
    fn recall_stability_grows() {
        let params = MemoryParams::default();
        let s = 5.0;
        let r = retrievability(s, 5.0);
        let grown = next_recall_stability(&params, 5.0, s, r, 3);
        assert!(grown > s);
    }

    #[test]
    fn hard_grows_less_than_good_less_than_easy() {
        let params = MemoryParams::default();
        let s = 5.0;
        let r = retrievability(s, 5.0);
        let hard = next_recall_stability(&params, 5.0, s, r, 2);
        let good = next_recall_stability(&params, 5.0, s, r, 3);
        let easy = next_recall_stability(&params, 5.0, s, r, 4);
        assert!(hard < good && good < easy);
    }

    #[test]
    fn forget_stability_never_exceeds_prior() {
        let params = MemoryParams::default();
        for s in [0.5, 2.0, 10.0, 100.0] {
            let r = retrievability(s, s);
            let reset = next_forget_stability(&params, 5.0, s, r);
            assert!(reset <= s);
            assert!(reset >= MIN_STABILITY);
        }
    }

    #[test]
    fn interval_monotone_in_stability() {
        let lo = next_interval(2.0, 0.9);
        let hi = next_interval(20.0, 0.9);
        assert!(lo < hi);
        assert!(lo >= 1.0);
        assert!(hi <= MAX_INTERVAL_DAYS);
    }

    #[test]
    fn params_serde_round_trip() {
        let params = MemoryParams::default();
        let json = serde_json::to_string(&params).unwrap();
        let back: MemoryParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params.w, back.w);
    }
}
