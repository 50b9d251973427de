//! Integration tests for the poll loop
//!
//! Each test writes an ingester-style document to a temporary directory and
//! drives monitor cycles against it.

use rust_anomaly_stream::anomaly::Direction;
use rust_anomaly_stream::data::{SharedState, StateStore, Trade};
use rust_anomaly_stream::fusion::{AlertEntry, SamplePoint, ANOMALY_NOTE};
use rust_anomaly_stream::{Analyzer, Monitor, MonitorConfig};
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;

fn setup(prices: &[f64]) -> (TempDir, Monitor) {
    let dir = tempfile::tempdir().unwrap();
    let config = MonitorConfig {
        state_path: dir.path().join("state").join("state.json"),
        poll_interval_ms: 1,
        ..MonitorConfig::default()
    };
    write_trades(&StateStore::new(&config.state_path), prices);
    (dir, Monitor::new(config).unwrap())
}

fn write_trades(store: &StateStore, prices: &[f64]) {
    let mut state = store.try_load().ok().flatten().unwrap_or_default();
    state.last_trades = prices
        .iter()
        .enumerate()
        .map(|(i, &p)| Trade::new(p, 0.01, 1_700_000_000_000 + i as i64, i % 2 == 0))
        .collect();
    store.save(&state).unwrap();
}

fn alternating(n: usize, center: f64, amplitude: f64) -> Vec<f64> {
    (0..n)
        .map(|i| center + if i % 2 == 0 { amplitude } else { -amplitude })
        .collect()
}

#[test]
fn test_missing_document_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = MonitorConfig {
        state_path: dir.path().join("state.json"),
        ..MonitorConfig::default()
    };
    let mut monitor = Monitor::new(config).unwrap();

    assert!(monitor.run_cycle(1).unwrap().is_none());
    assert!(!monitor.store().path().exists());
}

#[test]
fn test_short_history_is_left_untouched() {
    let (_dir, mut monitor) = setup(&[100.0; 9]);

    assert!(monitor.run_cycle(1).unwrap().is_none());
    let state = monitor.store().load();
    assert!(state.stats.is_none());
    assert!(state.alerts.is_empty());
}

#[test]
fn test_constant_prices_write_sample_point() {
    let (_dir, mut monitor) = setup(&[100.0; 120]);

    let decision = monitor.run_cycle(5).unwrap().unwrap();
    assert!(!decision.anomaly);
    assert_eq!(decision.zscore, 0.0);
    assert_eq!(decision.cusum_count, 0);
    assert_eq!(decision.variance_pval, 1.0);

    let state = monitor.store().load();
    assert_eq!(state.last_update, Some(5));
    assert_eq!(state.stats.map(|s| s.sigma), Some(1.0));
    assert_eq!(
        state.alerts,
        vec![AlertEntry::Sample(SamplePoint {
            ts: 5,
            price: 100.0,
            anomaly: false
        })]
    );
}

#[test]
fn test_price_jump_raises_positive_cusum_alert() {
    let mut prices = vec![100.0; 127];
    prices.extend([130.0, 130.0, 130.0]);
    let (_dir, mut monitor) = setup(&prices);

    let decision = monitor.run_cycle(10).unwrap().unwrap();
    assert!(decision.cusum_count >= 1);
    assert!(decision.anomaly);
    assert_eq!(decision.note.as_deref(), Some(ANOMALY_NOTE));

    let window: Vec<f64> = prices[prices.len() - 120..].to_vec();
    let analysis = Analyzer::default()
        .analyze(&window, 0, &mut Default::default())
        .unwrap();
    assert!(analysis.cusum.count_direction(Direction::Positive) >= 1);

    let state = monitor.store().load();
    match state.alerts.last() {
        Some(AlertEntry::Decision(d)) => assert_eq!(d, &decision),
        other => panic!("expected a full decision, got {:?}", other),
    }
}

#[test]
fn test_volatility_regime_change_is_detected() {
    let mut prices = alternating(60, 100.0, 1.0);
    prices.extend(alternating(60, 100.0, 10.0));
    let (_dir, mut monitor) = setup(&prices);

    let decision = monitor.run_cycle(1).unwrap().unwrap();
    assert!(decision.variance_pval < 0.01);
    assert!(decision.anomaly);
}

#[test]
fn test_outlier_after_retrain_window() {
    let mut prices = vec![100.0; 500];
    prices.push(1000.0);
    let (_dir, mut monitor) = setup(&prices);

    let decision = monitor.run_cycle(1).unwrap().unwrap();
    assert!(decision.isolation_flag);
    assert!(decision.anomaly);
    assert!(monitor.model().is_trained());
    assert!(!monitor.model().is_outlier(100.0));
}

#[test]
fn test_no_model_before_retrain_window() {
    let mut prices = vec![100.0; 400];
    prices.push(1000.0);
    let (_dir, mut monitor) = setup(&prices);

    let decision = monitor.run_cycle(1).unwrap().unwrap();
    assert!(!decision.isolation_flag);
    assert!(!monitor.model().is_trained());
}

#[test]
fn test_alert_log_stays_bounded() {
    let (_dir, mut monitor) = setup(&[100.0; 50]);

    let mut state = monitor.store().load();
    state.alerts = (0..199)
        .map(|ts| {
            AlertEntry::Sample(SamplePoint {
                ts,
                price: 100.0,
                anomaly: false,
            })
        })
        .collect();
    monitor.store().save(&state).unwrap();

    for ts in 1000..1010 {
        monitor.run_cycle(ts).unwrap();
        assert!(monitor.store().load().alerts.len() <= 200);
    }

    let alerts = monitor.store().load().alerts;
    assert_eq!(alerts.len(), 200);
    assert_eq!(alerts.last().map(|e| e.ts()), Some(1009));
}

#[test]
fn test_repeated_cycles_without_new_trades_are_identical() {
    let prices: Vec<f64> = (0..600)
        .map(|i| 30_000.0 + (i as f64 * 0.21).sin() * 15.0)
        .collect();
    let (_dir, mut monitor) = setup(&prices);

    let first = monitor.run_cycle(1).unwrap().unwrap();
    let second = monitor.run_cycle(2).unwrap().unwrap();

    assert_eq!(first.price, second.price);
    assert_eq!(first.mu.to_bits(), second.mu.to_bits());
    assert_eq!(first.sigma.to_bits(), second.sigma.to_bits());
    assert_eq!(first.zscore.to_bits(), second.zscore.to_bits());
    assert_eq!(first.cusum_count, second.cusum_count);
    assert_eq!(first.variance_pval.to_bits(), second.variance_pval.to_bits());
    assert_eq!(first.isolation_flag, second.isolation_flag);
    assert_eq!(first.anomaly, second.anomaly);
}

#[test]
fn test_foreign_fields_survive_cycle() {
    let (_dir, mut monitor) = setup(&[100.0; 20]);

    let mut state: SharedState = monitor.store().load();
    state
        .extra
        .insert("timestamp".to_string(), serde_json::Value::from(123));
    monitor.store().save(&state).unwrap();

    monitor.run_cycle(1).unwrap();

    let state = monitor.store().load();
    assert_eq!(state.extra.get("timestamp"), Some(&serde_json::Value::from(123)));
    assert_eq!(state.last_trades.len(), 20);
}

#[test]
fn test_huge_prices_keep_document_readable() {
    let prices: Vec<f64> = (0..20)
        .map(|i| if i % 2 == 0 { 1e308 } else { 0.9e308 })
        .collect();
    let (_dir, mut monitor) = setup(&prices);

    let first = monitor.run_cycle(1).unwrap().unwrap();
    assert!(first.mu.is_finite());
    assert!(first.zscore.is_finite());

    let state = monitor.store().try_load().unwrap().unwrap();
    let stats = state.stats.unwrap();
    assert!(stats.mu.is_finite() && stats.sigma.is_finite() && stats.zscore.is_finite());

    assert!(monitor.run_cycle(2).unwrap().is_some());
    let state = monitor.store().try_load().unwrap().unwrap();
    assert_eq!(state.alerts.len(), 2);
    assert_eq!(state.last_update, Some(2));
}

#[test]
fn test_run_stops_after_iterations() {
    let (_dir, mut monitor) = setup(&[100.0; 30]);
    let running = AtomicBool::new(true);

    let summary = monitor.run(&running, Some(3));
    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.decisions, 3);
    assert_eq!(summary.anomalies, 0);
    assert_eq!(monitor.store().load().alerts.len(), 3);
}

#[test]
fn test_run_exits_when_not_running() {
    let (_dir, mut monitor) = setup(&[100.0; 30]);
    let running = AtomicBool::new(false);

    let summary = monitor.run(&running, None);
    assert_eq!(summary.cycles, 0);
}
