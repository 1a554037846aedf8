//! Read-only summary statistics over task/habit snapshots. Nothing in here
//! touches the store.

use chrono::NaiveDateTime;

use crate::model::{Habit, Task};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionBreakdown {
    pub completed: usize,
    pub incomplete: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staleness {
    pub name: String,
    /// Whole days since the habit was last logged, never negative.
    pub days: i64,
}

/// Percentage of tasks marked completed. `None` when there are no tasks,
/// so callers can show "no data" instead of a division by zero.
pub fn completion_rate(tasks: &[Task]) -> Option<f64> {
    if tasks.is_empty() {
        return None;
    }
    let completed = tasks.iter().filter(|t| t.completed).count();
    Some(completed as f64 / tasks.len() as f64 * 100.0)
}

/// Completed vs incomplete counts, for charting.
pub fn completion_breakdown(tasks: &[Task]) -> CompletionBreakdown {
    let completed = tasks.iter().filter(|t| t.completed).count();
    CompletionBreakdown {
        completed,
        incomplete: tasks.len() - completed,
    }
}

/// Days since each habit was last logged, relative to `now`. A `last_logged`
/// in the future (clock skew) clamps to zero rather than going negative.
pub fn habit_staleness(habits: &[Habit], now: NaiveDateTime) -> Vec<Staleness> {
    habits
        .iter()
        .map(|habit| Staleness {
            name: habit.name.clone(),
            days: (now - habit.last_logged).num_days().max(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Frequency;
    use chrono::{Duration, NaiveDate};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn task(id: i64, completed: bool) -> Task {
        Task {
            id,
            title: format!("task {id}"),
            description: String::new(),
            due_date: at(2026, 1, 1),
            completed,
        }
    }

    fn habit(name: &str, last_logged: NaiveDateTime) -> Habit {
        Habit {
            id: 1,
            name: name.to_string(),
            frequency: Frequency::Daily,
            last_logged,
        }
    }

    #[test]
    fn completion_rate_of_empty_set_is_no_data() {
        assert_eq!(completion_rate(&[]), None);
    }

    #[test]
    fn completion_rate_half_done_is_fifty_percent() {
        let tasks = vec![task(1, true), task(2, false)];
        assert_eq!(completion_rate(&tasks), Some(50.0));
    }

    #[test]
    fn completion_rate_all_done_is_hundred_percent() {
        let tasks = vec![task(1, true), task(2, true)];
        assert_eq!(completion_rate(&tasks), Some(100.0));
    }

    #[test]
    fn breakdown_counts_both_sides() {
        let tasks = vec![task(1, true), task(2, false), task(3, false)];
        assert_eq!(
            completion_breakdown(&tasks),
            CompletionBreakdown {
                completed: 1,
                incomplete: 2
            }
        );
        assert_eq!(completion_breakdown(&[]), CompletionBreakdown::default());
    }

    #[test]
    fn staleness_counts_whole_days() {
        let now = at(2026, 8, 29);
        let habits = vec![
            habit("fresh", now),
            habit("three days", now - Duration::days(3)),
            habit("almost a day", now - Duration::hours(23)),
        ];
        let staleness = habit_staleness(&habits, now);
        assert_eq!(staleness[0].days, 0);
        assert_eq!(staleness[1].days, 3);
        assert_eq!(staleness[2].days, 0);
    }

    #[test]
    fn staleness_clamps_future_timestamps_to_zero() {
        let now = at(2026, 8, 29);
        let habits = vec![habit("skewed", now + Duration::days(2))];
        assert_eq!(habit_staleness(&habits, now)[0].days, 0);
    }

    #[test]
    fn staleness_of_empty_set_is_empty() {
        assert!(habit_staleness(&[], at(2026, 8, 29)).is_empty());
    }
}
