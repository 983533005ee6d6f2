// tests/property_run_state.rs

use proptest::prelude::*;
use taskloop::engine::{FailureVerdict, RetryLimits, RunState};

/// One recorded outcome: (task index, succeeded?).
fn outcomes_strategy() -> impl Strategy<Value = Vec<(u8, bool)>> {
    proptest::collection::vec((0u8..4, any::<bool>()), 1..60)
}

proptest! {
    #[test]
    fn consecutive_failures_is_zero_after_any_success(
        outcomes in outcomes_strategy(),
        max_retries in 0u32..4,
    ) {
        let limits = RetryLimits { max_retries, max_consecutive_failures: u32::MAX };
        let mut state = RunState::new();

        for (task, ok) in outcomes {
            let id = format!("task_{task}");
            if ok {
                state.record_success();
                prop_assert_eq!(state.consecutive_failures, 0);
            } else {
                let before = state.consecutive_failures;
                state.record_failure(&id, limits);
                prop_assert_eq!(state.consecutive_failures, before + 1);
            }
        }
    }

    #[test]
    fn abort_happens_exactly_when_streak_reaches_limit(
        outcomes in outcomes_strategy(),
        max_consecutive_failures in 1u32..6,
    ) {
        let limits = RetryLimits { max_retries: u32::MAX - 1, max_consecutive_failures };
        let mut state = RunState::new();
        let mut streak = 0u32;

        for (task, ok) in outcomes {
            let id = format!("task_{task}");
            if ok {
                state.record_success();
                streak = 0;
                continue;
            }

            streak += 1;
            let verdict = state.record_failure(&id, limits);
            let aborted = matches!(verdict, FailureVerdict::Abort { .. });
            prop_assert_eq!(aborted, streak >= max_consecutive_failures);
            if aborted {
                // The loop stops at the first abort.
                prop_assert_eq!(streak, max_consecutive_failures);
                break;
            }
        }
    }

    #[test]
    fn skip_requires_more_than_max_retries_consecutive_failures_of_one_task(
        outcomes in outcomes_strategy(),
        max_retries in 0u32..4,
    ) {
        let limits = RetryLimits { max_retries, max_consecutive_failures: u32::MAX };
        let mut state = RunState::new();
        let mut last: Option<String> = None;
        let mut same_task_streak = 0u32;

        for (task, ok) in outcomes {
            let id = format!("task_{task}");
            if state.skipped.contains(&id) {
                // A skipped task is never selected again.
                continue;
            }
            if ok {
                state.record_success();
                last = None;
                same_task_streak = 0;
                continue;
            }

            if last.as_deref() == Some(id.as_str()) {
                same_task_streak += 1;
            } else {
                last = Some(id.clone());
                same_task_streak = 1;
            }

            match state.record_failure(&id, limits) {
                FailureVerdict::Skip { failures } => {
                    prop_assert_eq!(failures, max_retries + 1);
                    prop_assert_eq!(same_task_streak, max_retries + 1);
                    last = None;
                    same_task_streak = 0;
                }
                FailureVerdict::Retry { failures, .. } => {
                    prop_assert_eq!(failures, same_task_streak);
                    prop_assert!(failures <= max_retries);
                }
                FailureVerdict::Abort { .. } => prop_assert!(false, "abort disabled"),
            }
        }
    }
}
