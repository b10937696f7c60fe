//! Contract Test: Core-Owned Retry
//!
//! This test verifies that transient provider failures are retried by the
//! core, within finite budgets, and that providers never need to retry.
//!
//! Constraints verified:
//! - Connection resets back off with growing delays
//! - Exhausting any of the four budgets re-raises the error that exhausted it
//! - Each failure class has its own budget
//! - Timeouts retry immediately
//! - Rate limits wait time_until_reset / (remaining + 1)
//! - Protocol failures are never retried
//!
//! If this test fails, retry logic has moved to the wrong layer or become
//! unbounded.

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use zonesync_core::changeset::Changeset;
use zonesync_core::error::Error;
use zonesync_core::retry::RateLimit;
use zonesync_core::zone::{Zone, ZoneConfig};

fn single_addition(provider: Arc<ScriptedProvider>) -> Changeset {
    Changeset::new(
        vec![],
        vec![a("www.example.com.", "10.0.0.1", 60)],
        "example.com.",
        provider,
    )
}

#[tokio::test]
async fn five_resets_then_success() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    for _ in 0..5 {
        provider.fail_next("add", Error::connection_reset("scripted", "reset by peer"));
    }
    let (policy, sleeper) = recording_policy();

    assert_ok!(single_addition(provider.clone()).apply(&policy).await);

    assert_eq!(provider.attempts(), 6);
    let delays = sleeper.delays();
    assert_eq!(delays.len(), 5);
    assert!(delays.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", delays);
    assert_eq!(delays[0], Duration::from_secs(1));
}

#[tokio::test]
async fn sixth_reset_is_raised() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.fail_always("add", || Error::connection_reset("scripted", "reset by peer"));
    let (policy, sleeper) = recording_policy();

    let error = assert_err!(single_addition(provider.clone()).apply(&policy).await);

    assert!(matches!(error, Error::ConnectionReset { .. }));
    assert_eq!(provider.attempts(), 6);
    assert_eq!(sleeper.delays().len(), 5);
}

#[tokio::test]
async fn sixth_timeout_is_raised() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.fail_always("add", || Error::timeout("scripted", "deadline exceeded"));
    let (policy, sleeper) = recording_policy();

    let error = assert_err!(single_addition(provider.clone()).apply(&policy).await);

    assert!(matches!(error, Error::Timeout { .. }));
    assert_eq!(provider.attempts(), 6);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn sixth_unparseable_response_is_raised() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.fail_always("add", || Error::unparseable("scripted", "<html>"));
    let (policy, sleeper) = recording_policy();

    let error = assert_err!(single_addition(provider.clone()).apply(&policy).await);

    assert!(matches!(error, Error::UnparseableResponse { .. }));
    assert_eq!(provider.attempts(), 6);
    assert_eq!(
        sleeper.delays(),
        [1, 2, 4, 8, 16].map(Duration::from_secs).to_vec()
    );
}

#[tokio::test]
async fn sixth_rate_limit_is_raised() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.fail_always("add", || {
        Error::rate_limited("scripted", RateLimit::new(0, Duration::from_secs(2)))
    });
    let (policy, sleeper) = recording_policy();

    let error = assert_err!(single_addition(provider.clone()).apply(&policy).await);

    assert!(matches!(error, Error::RateLimited { .. }));
    assert_eq!(provider.attempts(), 6);
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(2); 5]);
}

#[tokio::test]
async fn budgets_are_counted_per_failure_class() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    for _ in 0..5 {
        provider.fail_next("add", Error::timeout("scripted", "deadline exceeded"));
    }
    for _ in 0..5 {
        provider.fail_next("add", Error::connection_reset("scripted", "reset by peer"));
    }
    let (policy, sleeper) = recording_policy();

    assert_ok!(single_addition(provider.clone()).apply(&policy).await);

    assert_eq!(provider.attempts(), 11);
    assert_eq!(sleeper.delays().len(), 5);
}

#[tokio::test]
async fn timeouts_retry_without_waiting() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    for _ in 0..3 {
        provider.fail_next("add", Error::timeout("scripted", "deadline exceeded"));
    }
    let (policy, sleeper) = recording_policy();

    assert_ok!(single_addition(provider.clone()).apply(&policy).await);

    assert_eq!(provider.attempts(), 4);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn unparseable_responses_share_the_backoff() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.fail_next("add", Error::connection_reset("scripted", "reset"));
    provider.fail_next("add", Error::unparseable("scripted", "<html>"));
    let (policy, sleeper) = recording_policy();

    assert_ok!(single_addition(provider).apply(&policy).await);

    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn rate_limit_spreads_remaining_quota() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.fail_next(
        "add",
        Error::rate_limited("scripted", RateLimit::new(3, Duration::from_secs(20))),
    );
    let (policy, sleeper) = recording_policy();

    assert_ok!(single_addition(provider).apply(&policy).await);

    assert_eq!(sleeper.delays(), vec![Duration::from_secs(5)]);
}

#[tokio::test]
async fn protocol_failures_are_not_retried() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.fail_always("add", || Error::unsupported("scripted", "SSHFP"));
    let (policy, sleeper) = recording_policy();

    let error = assert_err!(single_addition(provider.clone()).apply(&policy).await);

    assert!(matches!(error, Error::UnsupportedRecordType { .. }));
    assert_eq!(provider.attempts(), 1);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn record_fetch_is_retried_too() {
    let provider = Arc::new(ScriptedProvider::new("scripted"));
    provider.serve("example.com.", vec![a("www.example.com.", "10.0.0.1", 60)]);
    provider.fail_next("retrieve", Error::connection_reset("scripted", "reset"));
    let (policy, sleeper) = recording_policy();

    let zone = Zone::new(
        "example.com.",
        ZoneConfig::new(["scripted"]),
        vec![a("www.example.com.", "10.0.0.1", 60)],
    );
    let changeset = assert_ok!(zone.changeset(provider.clone(), &policy).await);

    assert!(changeset.is_empty());
    assert_eq!(
        provider.calls(),
        vec!["retrieve example.com.", "retrieve example.com."]
    );
    assert_eq!(sleeper.delays().len(), 1);
}
