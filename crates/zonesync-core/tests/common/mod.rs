//! Test doubles and common utilities for contract tests
//!
//! The scripted provider records every call in order and fails on demand,
//! so tests can check the apply protocol and retry budgets without a real
//! vendor behind it.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zonesync_core::error::{Error, Result};
use zonesync_core::record::{Record, RecordData, RecordType};
use zonesync_core::retry::{RetryPolicy, Sleeper};
use zonesync_core::traits::Provider;

/// Sleeper that records requested delays instead of sleeping
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Default retry policy wired to a recording sleeper
pub fn recording_policy() -> (RetryPolicy, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let policy = RetryPolicy::default().with_sleeper(sleeper.clone());
    (policy, sleeper)
}

/// Provider that logs calls and fails from a script
///
/// Calls are logged as `"<operation>"` or `"<operation> <fqdn>"`.
/// Operations: `retrieve`, `add`, `remove`, `update`, `thaw`, `freeze`,
/// `publish`, `discard`.
pub struct ScriptedProvider {
    name: &'static str,
    records: Mutex<HashMap<String, Vec<Record>>>,
    calls: Mutex<Vec<String>>,
    queued: Mutex<HashMap<&'static str, VecDeque<Error>>>,
    always: Mutex<HashMap<&'static str, fn() -> Error>>,
    attempts: AtomicUsize,
    locking: bool,
    batching: bool,
}

impl ScriptedProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            records: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            queued: Mutex::new(HashMap::new()),
            always: Mutex::new(HashMap::new()),
            attempts: AtomicUsize::new(0),
            locking: false,
            batching: false,
        }
    }

    /// Advertise freeze/thaw support
    pub fn locking(mut self) -> Self {
        self.locking = true;
        self
    }

    /// Advertise staged writes with publish/discard
    pub fn batching(mut self) -> Self {
        self.batching = true;
        self
    }

    /// Records returned by `retrieve_current_records(zone)`
    pub fn serve(&self, zone: &str, records: Vec<Record>) {
        self.records
            .lock()
            .unwrap()
            .insert(zone.to_string(), records);
    }

    /// Fail the next call to `operation` with `error`
    pub fn fail_next(&self, operation: &'static str, error: Error) {
        self.queued
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Fail every call to `operation`
    pub fn fail_always(&self, operation: &'static str, error: fn() -> Error) {
        self.always.lock().unwrap().insert(operation, error);
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Total calls made (including failed ones)
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn call(&self, operation: &'static str, subject: Option<&str>) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(match subject {
            Some(subject) => format!("{} {}", operation, subject),
            None => operation.to_string(),
        });

        if let Some(error) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if let Some(error) = self.always.lock().unwrap().get(operation) {
            return Err(error());
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn retrieve_current_records(&self, zone: &str) -> Result<Vec<Record>> {
        self.call("retrieve", Some(zone))?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(zone)
            .cloned()
            .unwrap_or_default())
    }

    async fn add(&self, record: &Record, _zone: &str) -> Result<()> {
        self.call("add", Some(record.fqdn()))
    }

    async fn remove(&self, record: &Record, _zone: &str) -> Result<()> {
        self.call("remove", Some(record.fqdn()))
    }

    async fn update(&self, _id: &str, record: &Record, _zone: &str) -> Result<()> {
        self.call("update", Some(record.fqdn()))
    }

    async fn zones(&self) -> Result<Vec<String>> {
        Ok(self.records.lock().unwrap().keys().cloned().collect())
    }

    fn supports_locking(&self) -> bool {
        self.locking
    }

    async fn freeze_zone(&self, _zone: &str) -> Result<()> {
        self.call("freeze", None)
    }

    async fn thaw_zone(&self, _zone: &str) -> Result<()> {
        self.call("thaw", None)
    }

    fn batches_writes(&self) -> bool {
        self.batching
    }

    async fn publish(&self, _zone: &str) -> Result<()> {
        self.call("publish", None)
    }

    async fn discard(&self, _zone: &str) -> Result<()> {
        self.call("discard", None)
    }

    fn record_types(&self) -> BTreeSet<RecordType> {
        RecordType::ALL
            .into_iter()
            .filter(|t| *t != RecordType::Alias)
            .collect()
    }
}

pub fn a(fqdn: &str, address: &str, ttl: i64) -> Record {
    Record::new(
        fqdn,
        ttl,
        RecordData::A {
            address: address.to_string(),
        },
    )
}

pub fn cname(fqdn: &str, target: &str, ttl: i64) -> Record {
    Record::new(
        fqdn,
        ttl,
        RecordData::Cname {
            cname: target.to_string(),
        },
    )
}

pub fn txt(fqdn: &str, text: &str) -> Record {
    Record::new(
        fqdn,
        300,
        RecordData::Txt {
            txtdata: text.to_string(),
        },
    )
}
