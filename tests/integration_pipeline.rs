//! End-to-end runs over the in-memory broker.

mod common;

use pv_sim::devices::meter::MAX_POWER_W;
use pv_sim::io::results::{HEADER, load_records};
use pv_sim::runner::{self, SimulationOutcome};
use pv_sim::shutdown::Shutdown;
use pv_sim::sim::types::RunOutcome;

async fn simulate(config: &pv_sim::config::SimulationConfig) -> SimulationOutcome {
    runner::simulate(config, Shutdown::never())
        .await
        .expect("simulation should succeed")
}

#[tokio::test]
async fn hour_run_writes_one_row_per_reading() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let config = common::hour_config(dir.path(), "results.csv");

    let outcome = simulate(&config).await;
    assert_eq!(outcome.generator.readings, 720);
    assert_eq!(outcome.generator.outcome, RunOutcome::Completed);
    assert_eq!(outcome.aggregator.records, 720);
    assert_eq!(outcome.aggregator.outcome, RunOutcome::Completed);
    assert_eq!(outcome.aggregator.out_of_order, 0);

    let text = common::read(&config.output.path);
    assert_eq!(text.lines().next(), Some(HEADER.join(",").as_str()));
    assert_eq!(text.matches("timestamp").count(), 1);
    assert_eq!(text.lines().count(), 721);

    let records = load_records(&config.output.path).expect("results should load");
    assert_eq!(records.len(), 720);
    assert_eq!(records[0].timestamp_iso(), "2024-06-21T00:00:00");
    assert_eq!(records[719].timestamp_iso(), "2024-06-21T00:59:55");
    for r in &records {
        assert!((0.0..MAX_POWER_W).contains(&r.meter_power_w));
        // Midnight to 1 AM is before sunrise.
        assert_eq!(r.pv_power_w, 0.0);
        assert_eq!(r.sum_power_w, r.meter_power_w - r.pv_power_w);
    }
}

#[tokio::test]
async fn full_day_follows_the_solar_curve() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let mut config = common::hour_config(dir.path(), "day.csv");
    config.meter.horizon_s = 86_400;

    let outcome = simulate(&config).await;
    assert_eq!(outcome.aggregator.records, 17_280);

    let records = load_records(&config.output.path).expect("results should load");
    assert_eq!(records.len(), 17_280);
    for (i, r) in records.iter().enumerate() {
        let t = i as u64 * 5;
        let hour = t as f64 / 3600.0;
        if !(5.4..20.8).contains(&hour) {
            assert_eq!(r.pv_power_w, 0.0, "pv at t={t}");
        }
        assert_eq!(r.sum_power_w, r.meter_power_w - r.pv_power_w);
    }
    assert_eq!(records[21_600 / 5].pv_power_w, 56.0);
    assert_eq!(records[73_800 / 5].pv_power_w, 164.5);
    let noon = records[43_200 / 5].pv_power_w;
    assert!((2921.94..=2961.94).contains(&noon), "noon pv {noon}");
    assert!(outcome.aggregator.stats.peak_pv_w > 2900.0);
}

#[tokio::test]
async fn same_seeds_give_identical_files() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let first = common::hour_config(dir.path(), "a.csv");
    let second = common::hour_config(dir.path(), "b.csv");

    simulate(&first).await;
    simulate(&second).await;

    let a = common::read(&first.output.path);
    assert!(!a.is_empty());
    assert_eq!(a, common::read(&second.output.path));
}

#[tokio::test]
async fn rerun_replaces_previous_results() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let config = common::hour_config(dir.path(), "results.csv");

    simulate(&config).await;
    let before = common::read(&config.output.path);
    simulate(&config).await;

    let after = common::read(&config.output.path);
    assert_eq!(after.lines().count(), 721);
    assert_eq!(before, after);
}

#[tokio::test]
async fn report_matches_live_statistics() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let config = common::hour_config(dir.path(), "results.csv");

    let outcome = simulate(&config).await;
    let stats = runner::report(&config.output.path, config.meter.step_s);
    assert_eq!(stats.ok(), Some(outcome.aggregator.stats));
}

#[tokio::test]
async fn cancelled_run_leaves_empty_store() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let config = common::hour_config(dir.path(), "results.csv");
    let (trigger, shutdown) = Shutdown::pair();
    trigger.trigger();

    let res = runner::simulate(&config, shutdown).await;
    let outcome = res.expect("cancelled run should not fail");
    assert_eq!(outcome.generator.outcome, RunOutcome::Cancelled);
    assert_eq!(outcome.generator.readings, 0);
    assert_eq!(outcome.aggregator.outcome, RunOutcome::Cancelled);
    assert!(config.output.path.exists());
    assert_eq!(common::read(&config.output.path), "");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_during_paced_run_keeps_valid_prefix() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let mut config = common::hour_config(dir.path(), "results.csv");
    config.meter.pace_ms = 2;
    let (trigger, shutdown) = Shutdown::pair();

    let run_config = config.clone();
    let run = tokio::spawn(async move { runner::simulate(&run_config, shutdown).await });
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    trigger.trigger();

    let outcome = run
        .await
        .expect("simulation task should not panic")
        .expect("cancelled run should not fail");
    assert_eq!(outcome.generator.outcome, RunOutcome::Cancelled);
    assert!(outcome.generator.readings > 0);
    assert!(outcome.generator.readings < 720);
    assert!(outcome.aggregator.records > 0);
    assert!(outcome.aggregator.records <= outcome.generator.readings);

    let records = load_records(&config.output.path).expect("partial results should load");
    assert_eq!(records.len(), outcome.aggregator.records);
    for r in &records {
        assert_eq!(r.sum_power_w, r.meter_power_w - r.pv_power_w);
    }
}
