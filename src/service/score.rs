//! Score grammar validation and the pure feature extraction it feeds into
//! the Elo engine. Grounded on `app/services/score_features.py` of the
//! original implementation; exposed standalone so handlers and the match
//! service can both call into it without a DB round trip.

use crate::api_error::{ApiError, ApiResult};
use crate::models::match_::ScoreJson;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreFeatures {
    pub sets_played: i32,
    pub games_t1: i32,
    pub games_t2: i32,
    pub games_margin: i32,
    pub total_games: i32,
    pub tiebreak_sets: i32,
}

/// Validates a score against the bit-exact grammar and returns the
/// derived winner team number (1 or 2). Does not touch the database.
pub fn validate_score(score: &ScoreJson) -> ApiResult<i16> {
    let sets = &score.sets;
    if sets.len() != 2 && sets.len() != 3 {
        return Err(ApiError::validation("invalid_score", "a match has 2 or 3 sets"));
    }

    let mut set_winners: Vec<i16> = Vec::with_capacity(sets.len());
    for set in sets {
        let (t1, t2) = (set.t1, set.t2);
        if !(0..=7).contains(&t1) || !(0..=7).contains(&t2) {
            return Err(ApiError::validation("invalid_score", "set games must be between 0 and 7"));
        }
        if t1 == t2 {
            return Err(ApiError::validation("invalid_score", "a set cannot end in a tie"));
        }
        let max = t1.max(t2);
        let min = t1.min(t2);
        match max {
            6 => {
                if min > 4 {
                    return Err(ApiError::validation("invalid_score", "a 6-game set requires the loser at 4 or fewer"));
                }
            }
            7 => {
                if min != 5 && min != 6 {
                    return Err(ApiError::validation("invalid_score", "a 7-game set requires the loser at 5 or 6"));
                }
            }
            _ => {
                return Err(ApiError::validation("invalid_score", "a set must be won 6 or 7 games"));
            }
        }
        set_winners.push(if t1 > t2 { 1 } else { 2 });
    }

    match set_winners.len() {
        2 => {
            if set_winners[0] != set_winners[1] {
                return Err(ApiError::validation("invalid_score", "a 2-set match cannot split 1-1"));
            }
        }
        3 => {
            if set_winners[0] == set_winners[1] {
                return Err(ApiError::validation("invalid_score", "a 3-set match requires the first two sets split 1-1"));
            }
            let team1_wins = set_winners.iter().filter(|&&w| w == 1).count();
            let team2_wins = set_winners.iter().filter(|&&w| w == 2).count();
            if !((team1_wins == 2 && team2_wins == 1) || (team1_wins == 1 && team2_wins == 2)) {
                return Err(ApiError::validation("invalid_score", "a 3-set match must end 2-1"));
            }
        }
        _ => unreachable!(),
    }

    let team1_wins = set_winners.iter().filter(|&&w| w == 1).count();
    let team2_wins = set_winners.iter().filter(|&&w| w == 2).count();
    Ok(if team1_wins > team2_wins { 1 } else { 2 })
}

pub fn extract_score_features(score: &ScoreJson) -> ScoreFeatures {
    let sets = &score.sets;
    let games_t1: i32 = sets.iter().map(|s| s.t1).sum();
    let games_t2: i32 = sets.iter().map(|s| s.t2).sum();
    let tiebreak_sets = sets
        .iter()
        .filter(|s| {
            let mut pair = [s.t1, s.t2];
            pair.sort_unstable();
            pair == [6, 7]
        })
        .count() as i32;

    ScoreFeatures {
        sets_played: sets.len() as i32,
        games_t1,
        games_t2,
        games_margin: (games_t1 - games_t2).abs(),
        total_games: games_t1 + games_t2,
        tiebreak_sets,
    }
}

fn clamp(lo: f64, hi: f64, x: f64) -> f64 {
    x.max(lo).min(hi)
}

/// Margin-of-victory weight applied on top of the base K-factor.
pub fn mov_weight_from_features(f: &ScoreFeatures) -> f64 {
    let margin = f.games_margin.min(12) as f64;
    let mov_raw = 1.0 + 0.06 * margin - 0.08 * ((f.sets_played - 2) as f64);
    clamp(0.85, 1.25, mov_raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::match_::SetScoreIn;

    fn score(sets: &[(i32, i32)]) -> ScoreJson {
        ScoreJson {
            sets: sets.iter().map(|&(t1, t2)| SetScoreIn { t1, t2 }).collect(),
        }
    }

    #[test]
    fn accepts_straight_sets() {
        let s = score(&[(6, 4), (7, 5)]);
        assert_eq!(validate_score(&s).unwrap(), 1);
    }

    #[test]
    fn rejects_bad_six_game_set() {
        let s = score(&[(6, 5), (6, 3)]);
        assert!(validate_score(&s).is_err());
    }

    #[test]
    fn rejects_bad_seven_game_set() {
        let s = score(&[(8, 6), (6, 3)]);
        assert!(validate_score(&s).is_err());
    }

    #[test]
    fn rejects_split_two_set_match() {
        let s = score(&[(6, 4), (4, 6)]);
        assert!(validate_score(&s).is_err());
    }

    #[test]
    fn accepts_with_decider() {
        let s = score(&[(6, 4), (4, 6), (6, 2)]);
        assert_eq!(validate_score(&s).unwrap(), 1);
    }

    #[test]
    fn rejects_three_set_without_split() {
        let s = score(&[(6, 4), (6, 3), (6, 2)]);
        assert!(validate_score(&s).is_err());
    }

    #[test]
    fn mov_weight_clamped() {
        let f = extract_score_features(&score(&[(6, 0), (6, 0)]));
        assert_eq!(mov_weight_from_features(&f), 1.25);
    }

    #[test]
    fn mov_weight_three_set_penalty() {
        let f = extract_score_features(&score(&[(7, 6), (4, 6), (7, 6)]));
        let w = mov_weight_from_features(&f);
        assert!(w >= 0.85 && w <= 1.25);
    }
}
