//! Meter and PV simulator as separate clients of the TCP relay.

mod common;

use pv_sim::channel::ChannelError;
use pv_sim::error::SimError;
use pv_sim::io::results::load_records;
use pv_sim::runner;
use pv_sim::shutdown::Shutdown;
use pv_sim::sim::types::RunOutcome;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn meter_then_pv_over_relay() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let (port, _relay) = common::start_relay().await;
    let mut config = common::hour_config(dir.path(), "results.csv");
    common::use_relay(&mut config, port);

    // The relay buffers the whole run until the PV simulator attaches.
    let meter = runner::run_meter(&config, Shutdown::never()).await;
    assert_eq!(meter.map(|r| r.readings).ok(), Some(720));

    let pv = runner::run_pv(&config, Shutdown::never()).await;
    let report = pv.expect("pv should succeed");
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.records, 720);
    assert_eq!(report.out_of_order, 0);

    let records = load_records(&config.output.path).expect("results should load");
    assert_eq!(records.len(), 720);
    for r in &records {
        assert_eq!(r.sum_power_w, r.meter_power_w - r.pv_power_w);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn relay_run_matches_in_process_run() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let (port, _relay) = common::start_relay().await;
    let mut networked = common::hour_config(dir.path(), "relay.csv");
    common::use_relay(&mut networked, port);
    let local = common::hour_config(dir.path(), "local.csv");

    let (meter, pv) = tokio::join!(
        runner::run_meter(&networked, Shutdown::never()),
        runner::run_pv(&networked, Shutdown::never()),
    );
    assert!(meter.is_ok(), "meter failed: {meter:?}");
    assert!(pv.is_ok(), "pv failed: {pv:?}");
    assert!(runner::simulate(&local, Shutdown::never()).await.is_ok());

    let relay_text = common::read(&networked.output.path);
    assert_eq!(relay_text.lines().count(), 721);
    assert_eq!(relay_text, common::read(&local.output.path));
}

#[tokio::test]
async fn pv_without_relay_fails_before_touching_output() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let (port, relay) = common::start_relay().await;
    relay.trigger();
    // Give the relay a moment to drop its listener.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut config = common::hour_config(dir.path(), "results.csv");
    common::use_relay(&mut config, port);

    let res = runner::run_pv(&config, Shutdown::never()).await;
    assert!(matches!(
        res,
        Err(SimError::Channel(ChannelError::Connect { .. }))
    ));
    assert!(!config.output.path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_cancels_waiting_pv() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let (port, _relay) = common::start_relay().await;
    let mut config = common::hour_config(dir.path(), "results.csv");
    common::use_relay(&mut config, port);

    let (trigger, shutdown) = Shutdown::pair();
    let pv = tokio::spawn(async move { runner::run_pv(&config, shutdown).await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    trigger.trigger();

    let report = pv
        .await
        .expect("pv task should not panic")
        .expect("cancelled pv should not fail");
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.records, 0);
}
