//! Timer state transitions for steps.
//!
//! A step is either stopped (`is_running = false`, `start_time_millis = 0`) or
//! running since `start_time_millis`. Only banked seconds are persisted; the
//! running interval is derived from the wall clock whenever it is needed.

use gtd_local_db::StepRecord;

/// Whole seconds between `start_millis` and `now_millis`.
///
/// A zero start stamp means "not started" and a clock that went backwards
/// contributes nothing.
pub fn elapsed_seconds(start_millis: i64, now_millis: i64) -> i64 {
    if start_millis == 0 {
        return 0;
    }
    ((now_millis - start_millis) / 1000).max(0)
}

/// Seconds to display for `step` at `now_millis`.
pub fn live_elapsed_seconds(step: &StepRecord, now_millis: i64) -> i64 {
    if step.is_running {
        step.dauer_seconds + elapsed_seconds(step.start_time_millis, now_millis)
    } else {
        step.dauer_seconds
    }
}

/// Start a stopped step, or stop a running one and bank its interval.
pub fn toggled(step: &StepRecord, now_millis: i64) -> StepRecord {
    let mut next = step.clone();
    if step.is_running {
        next.dauer_seconds += elapsed_seconds(step.start_time_millis, now_millis);
        next.is_running = false;
        next.start_time_millis = 0;
    } else {
        next.is_running = true;
        next.start_time_millis = now_millis;
    }
    next
}

/// Zero the banked seconds. A running step keeps running from `now_millis`.
pub fn reset(step: &StepRecord, now_millis: i64) -> StepRecord {
    let mut next = step.clone();
    next.dauer_seconds = 0;
    next.start_time_millis = if step.is_running { now_millis } else { 0 };
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtd_local_db::ProjectId;

    fn step(dauer_seconds: i64) -> StepRecord {
        StepRecord {
            dauer_seconds,
            ..StepRecord::new(ProjectId(1), "Run")
        }
    }

    #[test]
    fn start_then_pause_banks_whole_seconds() {
        let stopped = step(120);
        let running = toggled(&stopped, 10_000);
        assert!(running.is_running);
        assert_eq!(running.start_time_millis, 10_000);
        assert_eq!(running.dauer_seconds, 120);

        assert_eq!(live_elapsed_seconds(&running, 55_000), 165);

        let paused = toggled(&running, 55_999);
        assert!(!paused.is_running);
        assert_eq!(paused.start_time_millis, 0);
        assert_eq!(paused.dauer_seconds, 165);
        assert_eq!(live_elapsed_seconds(&paused, 99_000), 165);
    }

    #[test]
    fn running_without_start_stamp_banks_nothing() {
        let broken = StepRecord {
            is_running: true,
            start_time_millis: 0,
            ..step(30)
        };
        assert_eq!(live_elapsed_seconds(&broken, 50_000), 30);
        assert_eq!(toggled(&broken, 50_000).dauer_seconds, 30);
    }

    #[test]
    fn clock_going_backwards_counts_as_zero() {
        let running = toggled(&step(10), 50_000);
        assert_eq!(live_elapsed_seconds(&running, 40_000), 10);
        assert_eq!(toggled(&running, 40_000).dauer_seconds, 10);
    }

    #[test]
    fn reset_keeps_running_state() {
        let running = toggled(&step(90), 1_000);
        let reset_running = reset(&running, 7_000);
        assert!(reset_running.is_running);
        assert_eq!(reset_running.dauer_seconds, 0);
        assert_eq!(reset_running.start_time_millis, 7_000);

        let reset_stopped = reset(&step(90), 7_000);
        assert!(!reset_stopped.is_running);
        assert_eq!(reset_stopped.dauer_seconds, 0);
        assert_eq!(reset_stopped.start_time_millis, 0);
    }

    #[test]
    fn reopened_running_step_reconstructs_from_stale_stamp() {
        // Persisted as running an hour ago, never paused.
        let running = toggled(&step(60), 1_000);
        assert_eq!(live_elapsed_seconds(&running, 1_000 + 3_600_000), 3_660);
    }
}
