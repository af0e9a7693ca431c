//! Elo rating engine. Grounded on `app/services/elo.py`: same expected-score
//! formula, same rounding, same zero-sum delta construction. The K-factor
//! bucketing and provisional clamp come from spec section 4.3 and are applied
//! by the match service, which is the only caller with access to each
//! participant's `verified_matches` count.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloResult {
    pub delta_team1: i32,
    pub delta_team2: i32,
    pub expected_team1: f64,
    pub expected_team2: f64,
}

pub fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((r_b - r_a) / 400.0))
}

/// `winner_team_no` is 1 or 2. `k` is the effective (already-averaged)
/// K-factor for this match; `weight` is the margin-of-victory multiplier.
pub fn compute_elo(team1_rating: f64, team2_rating: f64, winner_team_no: i16, k: i32, weight: f64) -> EloResult {
    let e1 = expected_score(team1_rating, team2_rating);
    let e2 = 1.0 - e1;
    let s1 = if winner_team_no == 1 { 1.0 } else { 0.0 };
    let d1 = ((k as f64) * weight * (s1 - e1)).round() as i32;
    let d2 = -d1;
    EloResult { delta_team1: d1, delta_team2: d2, expected_team1: e1, expected_team2: e2 }
}

/// K-factor bucket from a participant's verified match count *before* this
/// match is applied.
pub fn k_factor_for(verified_matches: i32) -> i32 {
    if verified_matches < 5 {
        48
    } else if verified_matches < 20 {
        32
    } else {
        24
    }
}

/// Effective K for a match is the rounded mean of the four participants'
/// individual K-factors.
pub fn effective_k(ks: [i32; 4]) -> i32 {
    let sum: i32 = ks.iter().sum();
    ((sum as f64) / 4.0).round() as i32
}

pub fn clamp_provisional(delta: i32, cap: i32) -> i32 {
    delta.clamp(-cap, cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sum_deltas() {
        let r = compute_elo(1200.0, 1250.0, 1, 32, 1.0);
        assert_eq!(r.delta_team1, -r.delta_team2);
    }

    #[test]
    fn equal_ratings_expected_half() {
        assert!((expected_score(1200.0, 1200.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn k_factor_buckets() {
        assert_eq!(k_factor_for(0), 48);
        assert_eq!(k_factor_for(4), 48);
        assert_eq!(k_factor_for(5), 32);
        assert_eq!(k_factor_for(19), 32);
        assert_eq!(k_factor_for(20), 24);
        assert_eq!(k_factor_for(1000), 24);
    }

    #[test]
    fn effective_k_is_rounded_mean() {
        assert_eq!(effective_k([48, 48, 32, 24]), 38);
    }

    #[test]
    fn provisional_cap_clamps_both_directions() {
        assert_eq!(clamp_provisional(50, 30), 30);
        assert_eq!(clamp_provisional(-50, 30), -30);
        assert_eq!(clamp_provisional(10, 30), 10);
    }
}
