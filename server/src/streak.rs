// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::clock;
use chrono::NaiveDate;

/// The streak counters carried on a profile row. All decisions about
/// incrementing, holding or resetting a streak happen on this pair;
/// persistence is someone else's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakState {
    pub current_streak: i64,
    pub last_streak_updated: Option<NaiveDate>,
}

/// Decides what the first task completion of the day does to a streak.
///
/// Returns `None` when the streak already moved today, so repeated
/// completions within one calendar day are no-ops. A completion the day
/// after the last update extends the streak by one; a completion after a
/// gap (or with no history at all) starts a fresh streak of 1.
pub fn on_completion(state: StreakState, today: NaiveDate) -> Option<StreakState> {
    match state.last_streak_updated {
        Some(last) if last == today => None,
        Some(last) if clock::day_difference(today, last) == 1 => Some(StreakState {
            current_streak: state.current_streak + 1,
            last_streak_updated: Some(today),
        }),
        _ => Some(StreakState {
            current_streak: 1,
            last_streak_updated: Some(today),
        }),
    }
}

/// The streak-break check run at session start and by the server sweep.
///
/// A streak is broken when more than one full day has passed since it
/// last moved. Nothing-to-break states (no history, or already at zero)
/// report false, which is what makes repeated checks idempotent.
pub fn is_broken(state: StreakState, today: NaiveDate) -> bool {
    let Some(last) = state.last_streak_updated else {
        return false;
    };
    if state.current_streak == 0 {
        return false;
    }
    clock::day_difference(today, last) > 1
}
