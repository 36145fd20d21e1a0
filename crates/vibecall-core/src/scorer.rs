//! Compatibility scoring between two match requests.
//!
//! The weights are part of the matching contract and must not drift:
//! mood and intent are worth 30 points each, interest overlap up to 30
//! (10 per shared interest), and region contributes +10 on an exact
//! match or -5 when the regions differ and either side asked for nearby
//! partners. Pairing requires at least [`MIN_MATCH_SCORE`].

use crate::types::MatchingPreferences;

/// Minimum score two requests need to be paired.
pub const MIN_MATCH_SCORE: i32 = 20;

/// Score how well two sets of preferences fit together.
///
/// Pure and symmetric; the result ranges from -5 to 100. The region term
/// is only evaluated when both sides specify a region, and the
/// prefer-nearby penalty applies once even when both sides set it.
pub fn score(a: &MatchingPreferences, b: &MatchingPreferences) -> i32 {
    let mut score = 0;

    if a.mood == b.mood {
        score += 30;
    }

    if a.intent == b.intent {
        score += 30;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let shared = a.interests.intersection(&b.interests).count() as i32;
    score += (shared * 10).min(30);

    if let (Some(region_a), Some(region_b)) = (&a.region, &b.region) {
        if region_a == region_b {
            score += 10;
        } else if a.prefer_nearby.unwrap_or(false) || b.prefer_nearby.unwrap_or(false) {
            score -= 5;
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn prefs(mood: &str, intent: &str, interests: &[&str]) -> MatchingPreferences {
        MatchingPreferences {
            mood: mood.into(),
            intent: intent.into(),
            interests: interests.iter().map(|s| (*s).to_string()).collect(),
            region: None,
            language: None,
            prefer_nearby: None,
        }
    }

    fn with_region(mut p: MatchingPreferences, region: &str, nearby: Option<bool>) -> MatchingPreferences {
        p.region = Some(region.into());
        p.prefer_nearby = nearby;
        p
    }

    #[test]
    fn self_score_at_least_sixty() {
        let p = prefs("happy", "chat", &["music"]);
        assert!(score(&p, &p) >= 60);
    }

    #[test]
    fn score_is_symmetric() {
        let a = with_region(prefs("happy", "chat", &["music", "films"]), "eu", Some(true));
        let b = with_region(prefs("calm", "chat", &["films"]), "us", None);
        assert_eq!(score(&a, &b), score(&b, &a));
    }

    #[test]
    fn disjoint_requests_score_zero() {
        let a = prefs("happy", "chat", &["music"]);
        let b = prefs("sad", "vent", &["chess"]);
        assert_eq!(score(&a, &b), 0);
    }

    #[test]
    fn interest_overlap_caps_at_thirty() {
        let a = prefs("x", "y", &["a", "b", "c", "d", "e"]);
        let b = prefs("p", "q", &["a", "b", "c", "d", "e"]);
        assert_eq!(score(&a, &b), 30);
    }

    #[test]
    fn equal_region_adds_ten() {
        let a = with_region(prefs("happy", "chat", &[]), "eu", None);
        let b = with_region(prefs("happy", "chat", &[]), "eu", None);
        assert_eq!(score(&a, &b), 70);
    }

    #[test]
    fn equal_region_with_prefer_nearby_keeps_bonus() {
        // No penalty when regions match, regardless of the nearby flag.
        let a = with_region(prefs("happy", "chat", &[]), "eu", Some(true));
        let b = with_region(prefs("happy", "chat", &[]), "eu", None);
        assert_eq!(score(&a, &b), 70);
    }

    #[test]
    fn different_region_penalized_once() {
        let a = with_region(prefs("happy", "chat", &[]), "eu", Some(true));
        let b = with_region(prefs("happy", "chat", &[]), "us", Some(true));
        // Both sides set prefer_nearby; the -5 applies a single time.
        assert_eq!(score(&a, &b), 55);
    }

    #[test]
    fn region_ignored_when_one_side_unset() {
        let a = with_region(prefs("happy", "chat", &[]), "eu", Some(true));
        let b = prefs("happy", "chat", &[]);
        assert_eq!(score(&a, &b), 60);
    }

    #[test]
    fn score_can_go_negative() {
        let a = with_region(prefs("a", "b", &[]), "eu", Some(true));
        let b = with_region(prefs("c", "d", &[]), "us", None);
        assert_eq!(score(&a, &b), -5);
    }

    #[test]
    fn full_overlap_hits_hundred() {
        let p = with_region(prefs("happy", "chat", &["a", "b", "c"]), "eu", None);
        assert_eq!(score(&p, &p), 100);
    }
}
