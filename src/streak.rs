// src/streak.rs

use crate::constants::STREAK_MILESTONES;
use crate::models::StreakState;

pub fn increment(state: StreakState) -> StreakState {
    let streak = state.streak + 1;
    StreakState {
        streak,
        best_streak: state.best_streak.max(streak),
    }
}

/// Drops the current run; the best run is kept.
pub fn reset(state: StreakState) -> StreakState {
    StreakState {
        streak: 0,
        best_streak: state.best_streak,
    }
}

/// Celebration tag for a run that is at its best: `streak-N` on a milestone,
/// otherwise `new-best-streak`.
pub fn milestone(state: &StreakState) -> Option<String> {
    if state.streak == 0 || state.streak != state.best_streak {
        return None;
    }
    if STREAK_MILESTONES.contains(&state.streak) {
        Some(format!("streak-{}", state.streak))
    } else {
        Some("new-best-streak".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_tracks_best() {
        let s = increment(StreakState::default());
        assert_eq!(s, StreakState { streak: 1, best_streak: 1 });
        let s = reset(s);
        assert_eq!(s, StreakState { streak: 0, best_streak: 1 });
        let s = increment(s);
        assert_eq!(s.best_streak, 1);
    }

    #[test]
    fn test_milestones() {
        assert_eq!(milestone(&StreakState::default()), None);
        assert_eq!(
            milestone(&StreakState { streak: 5, best_streak: 5 }).as_deref(),
            Some("streak-5")
        );
        assert_eq!(
            milestone(&StreakState { streak: 6, best_streak: 6 }).as_deref(),
            Some("new-best-streak")
        );
        assert_eq!(milestone(&StreakState { streak: 5, best_streak: 9 }), None);
    }

    #[test]
    fn test_repeated_run_past_best() {
        let mut s = StreakState { streak: 0, best_streak: 3 };
        let mut tags = Vec::new();
        for _ in 0..5 {
            s = increment(s);
            tags.push(milestone(&s));
        }
        assert_eq!(
            tags,
            vec![
                None,
                None,
                Some("new-best-streak".to_string()),
                Some("new-best-streak".to_string()),
                Some("streak-5".to_string()),
            ]
        );
    }
}
