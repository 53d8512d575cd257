use std::collections::BTreeMap;
use std::time::Duration;

use slack_webhook::config::BackoffConfig;
use slack_webhook::telemetry::{StatusReport, Telemetry, TickerStatus};
use slack_webhook::{NotifierConfig, SharedBackoff, WebhookSender};
use tokio::sync::broadcast;
use tokio::time::timeout;

fn telemetry(period: Duration) -> Telemetry {
    Telemetry::new(period, SharedBackoff::new(&BackoffConfig::default()))
        .expect("telemetry should build")
}

async fn next_report(rx: &mut broadcast::Receiver<StatusReport>) -> StatusReport {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("report should arrive within two seconds")
        .expect("report channel should stay open")
}

#[tokio::test]
async fn tally_is_drained_on_each_tick() {
    let telemetry = telemetry(Duration::from_millis(50));
    let mut reports = telemetry.subscribe();

    telemetry.record_status(200);
    telemetry.record_status(200);
    telemetry.record_status(429);
    assert!(telemetry.start_ticker().unwrap());

    let first = next_report(&mut reports).await;
    assert_eq!(first.counts, BTreeMap::from([(200, 2), (429, 1)]));
    assert_eq!(first.report_interval, Duration::from_millis(50));
    assert_eq!(first.backoff.interval, Duration::from_millis(100));

    // Known codes survive the reset at zero
    let second = next_report(&mut reports).await;
    assert_eq!(second.counts, BTreeMap::from([(200, 0), (429, 0)]));

    telemetry.stop_ticker().await;
}

#[tokio::test]
async fn starting_twice_runs_one_reporter() {
    let telemetry = telemetry(Duration::from_millis(50));
    let mut reports = telemetry.subscribe();

    assert!(telemetry.start_ticker().unwrap());
    assert!(!telemetry.start_ticker().unwrap());

    next_report(&mut reports).await;
    assert_eq!(telemetry.active_reporters(), 1);
    assert_eq!(telemetry.ticker_status(), TickerStatus::Running);

    assert!(telemetry.stop_ticker().await);
    assert_eq!(telemetry.active_reporters(), 0);
}

#[tokio::test]
async fn concurrent_starts_spawn_once() {
    let telemetry = telemetry(Duration::from_secs(3600));

    let starts: Vec<_> = (0..8)
        .map(|_| {
            let telemetry = telemetry.clone();
            tokio::spawn(async move { telemetry.start_ticker().unwrap() })
        })
        .collect();

    let mut started = 0;
    for handle in starts {
        if handle.await.unwrap() {
            started += 1;
        }
    }

    assert_eq!(started, 1);
    telemetry.stop_ticker().await;
}

#[tokio::test]
async fn stop_is_prompt_with_long_interval() {
    let telemetry = telemetry(Duration::from_secs(3600));
    telemetry.start_ticker().unwrap();

    let stopped = timeout(Duration::from_secs(1), telemetry.stop_ticker())
        .await
        .expect("stop should not wait for a tick");

    assert!(stopped);
    assert_eq!(telemetry.ticker_status(), TickerStatus::Stopped);
    assert_eq!(telemetry.active_reporters(), 0);
}

#[tokio::test]
async fn no_reports_after_stop() {
    let telemetry = telemetry(Duration::from_millis(30));
    let mut reports = telemetry.subscribe();

    telemetry.start_ticker().unwrap();
    next_report(&mut reports).await;
    telemetry.stop_ticker().await;

    // Drop anything published before the stop completed
    while reports.try_recv().is_ok() {}
    assert!(timeout(Duration::from_millis(150), reports.recv()).await.is_err());
}

#[tokio::test]
async fn sender_lifecycle_follows_telemetry_flag() {
    let enabled = WebhookSender::new(NotifierConfig::default().with_telemetry(true)).unwrap();
    enabled.init().unwrap();
    assert_eq!(enabled.telemetry().ticker_status(), TickerStatus::Running);
    enabled.exit().await;
    assert_eq!(enabled.telemetry().ticker_status(), TickerStatus::Stopped);

    let disabled = WebhookSender::new(NotifierConfig::default()).unwrap();
    disabled.init().unwrap();
    disabled.exit().await;
    assert_eq!(disabled.telemetry().ticker_status(), TickerStatus::Idle);
}
