//! Aggregate statistics lifecycle tests.

use proptest::prelude::*;
use task_estimator::error::EstimateError;
use task_estimator::estimate::estimation_timeseries;
use task_estimator::types::{AggregateStats, TaskRecord};

fn task(i: usize, expected: f64, actual: f64) -> TaskRecord {
    TaskRecord::new(format!("t{}", i), "owner", expected, actual, i as i64, Vec::<String>::new())
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

mod scenario_tests {
    use super::*;

    #[test]
    fn six_task_owner() {
        let pairs = [
            (1000.0, 1200.0),
            (1000.0, 1000.0),
            (1000.0, 1400.0),
            (1000.0, 200.0),
            (1000.0, 3600.0),
            (1000.0, 4600.0),
        ];
        let mut stats = AggregateStats::default();
        for (i, (e, a)) in pairs.into_iter().enumerate() {
            stats.add_task(&task(i, e, a)).unwrap();
        }
        assert_eq!(stats.total_tasks_completed, 6);
        assert_eq!(stats.total_over_tasks, 4);
        assert_eq!(stats.total_under_tasks, 2);
        assert!(close(stats.avg_task_time, 2000.0));
        assert!(close(stats.task_est_factor, 2.0));
    }

    #[test]
    fn single_add_then_remove_is_zero() {
        let t = task(0, 1000.0, 1234.0);
        let mut stats = AggregateStats::default();
        stats.add_task(&t).unwrap();
        stats.remove_task(&t).unwrap();
        assert_eq!(stats.total_tasks_completed, 0);
        assert_eq!(stats.total_under_tasks, 0);
        assert_eq!(stats.total_over_tasks, 0);
        assert_eq!(stats.avg_task_time, 0.0);
        assert_eq!(stats.task_est_factor, 0.0);
    }

    #[test]
    fn zero_expected_is_invalid_arithmetic() {
        let mut stats = AggregateStats::default();
        assert!(matches!(
            stats.add_task(&task(0, 0.0, 10.0)),
            Err(EstimateError::InvalidArithmetic { .. })
        ));
        assert!(matches!(
            estimation_timeseries(&[task(0, 0.0, 10.0)]),
            Err(EstimateError::InvalidArithmetic { .. })
        ));
    }

    #[test]
    fn timeseries_ends_at_estimation_factor() {
        let tasks: Vec<TaskRecord> = [(100.0, 150.0), (200.0, 100.0), (50.0, 100.0)]
            .into_iter()
            .enumerate()
            .map(|(i, (e, a))| task(i, e, a))
            .collect();
        let series = estimation_timeseries(&tasks).unwrap();
        let stats = AggregateStats::from_tasks(&tasks).unwrap();
        assert_eq!(series.len(), 3);
        assert!(close(series[0].value, 1.5));
        assert!(close(series[1].value, 1.0));
        assert!(close(series[2].value, stats.task_est_factor));
        assert!(series.iter().all(|p| p.name.ends_with('Z')));
    }
}

fn duration() -> impl Strategy<Value = f64> {
    1.0..100_000.0f64
}

fn tasks() -> impl Strategy<Value = Vec<TaskRecord>> {
    prop::collection::vec((duration(), 0.0..200_000.0f64), 1..20).prop_map(|pairs| {
        pairs
            .into_iter()
            .enumerate()
            .map(|(i, (e, a))| task(i, e, a))
            .collect()
    })
}

proptest! {
    #[test]
    fn add_then_remove_restores_state(history in tasks(), e in duration(), a in 0.0..200_000.0f64) {
        let mut stats = AggregateStats::from_tasks(&history).unwrap();
        let before = stats;
        let extra = task(999, e, a);

        stats.add_task(&extra).unwrap();
        stats.remove_task(&extra).unwrap();

        prop_assert_eq!(stats.total_tasks_completed, before.total_tasks_completed);
        prop_assert_eq!(stats.total_under_tasks, before.total_under_tasks);
        prop_assert_eq!(stats.total_over_tasks, before.total_over_tasks);
        prop_assert!(close(stats.avg_task_time, before.avg_task_time));
        prop_assert!(close(stats.task_est_factor, before.task_est_factor));
    }

    #[test]
    fn counters_stay_consistent(history in tasks(), removals in 0usize..20) {
        let mut stats = AggregateStats::from_tasks(&history).unwrap();
        prop_assert!(stats.is_consistent());

        for t in history.iter().take(removals) {
            stats.remove_task(t).unwrap();
            prop_assert!(stats.is_consistent());
        }
        let expected = history.len().saturating_sub(removals) as u32;
        prop_assert_eq!(stats.total_tasks_completed, expected);
    }
}
