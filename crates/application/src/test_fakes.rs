use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tenure_core::{AppError, AppResult};
use tenure_domain::{CatalogAction, LeaseRecord, LeaseResourceKey, TaskCatalog};
use tokio::sync::Mutex;

use crate::worker_ports::{TaskCatalogSource, TaskExecutor, TaskLeaseStore, TaskWorkOrder};

#[derive(Default)]
pub(crate) struct FakeLeaseStore {
    records: Mutex<HashMap<String, LeaseRecord>>,
    holder_releases: AtomicUsize,
}

impl FakeLeaseStore {
    pub(crate) async fn insert(&self, key: &LeaseResourceKey, record: LeaseRecord) {
        self.records
            .lock()
            .await
            .insert(key.as_str().to_owned(), record);
    }

    pub(crate) async fn get(&self, key: &LeaseResourceKey) -> Option<LeaseRecord> {
        self.records.lock().await.get(key.as_str()).cloned()
    }

    pub(crate) fn holder_releases(&self) -> usize {
        self.holder_releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskLeaseStore for FakeLeaseStore {
    async fn try_create(&self, key: &LeaseResourceKey, record: &LeaseRecord) -> AppResult<bool> {
        let mut records = self.records.lock().await;
        if records.contains_key(key.as_str()) {
            return Ok(false);
        }

        records.insert(key.as_str().to_owned(), record.clone());
        Ok(true)
    }

    async fn read(&self, key: &LeaseResourceKey) -> AppResult<Option<LeaseRecord>> {
        Ok(self.get(key).await)
    }

    async fn touch(
        &self,
        key: &LeaseResourceKey,
        holder_id: &str,
        renewed_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut records = self.records.lock().await;
        match records.get_mut(key.as_str()) {
            Some(record) if record.is_held_by(holder_id) => {
                record.last_renewed_at = renewed_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, key: &LeaseResourceKey) -> AppResult<()> {
        self.records.lock().await.remove(key.as_str());
        Ok(())
    }

    async fn remove_if_holder(&self, key: &LeaseResourceKey, holder_id: &str) -> AppResult<bool> {
        self.holder_releases.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().await;
        if records
            .get(key.as_str())
            .is_some_and(|record| record.is_held_by(holder_id))
        {
            records.remove(key.as_str());
            return Ok(true);
        }

        Ok(false)
    }
}

/// Store where every create attempt loses a race and the winner is never visible.
pub(crate) struct ContendedLeaseStore;

#[async_trait]
impl TaskLeaseStore for ContendedLeaseStore {
    async fn try_create(&self, _key: &LeaseResourceKey, _record: &LeaseRecord) -> AppResult<bool> {
        Ok(false)
    }

    async fn read(&self, _key: &LeaseResourceKey) -> AppResult<Option<LeaseRecord>> {
        Ok(None)
    }

    async fn touch(
        &self,
        _key: &LeaseResourceKey,
        _holder_id: &str,
        _renewed_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        Ok(false)
    }

    async fn remove(&self, _key: &LeaseResourceKey) -> AppResult<()> {
        Ok(())
    }

    async fn remove_if_holder(
        &self,
        _key: &LeaseResourceKey,
        _holder_id: &str,
    ) -> AppResult<bool> {
        Ok(false)
    }
}

pub(crate) struct StaticCatalogSource {
    catalog: TaskCatalog,
}

impl StaticCatalogSource {
    pub(crate) fn with_tasks(keys: &[&str]) -> Self {
        Self::with_rules(keys, &[])
    }

    pub(crate) fn with_rules(keys: &[&str], rules: &[(&str, &[&str])]) -> Self {
        Self {
            catalog: TaskCatalog {
                tasks: keys
                    .iter()
                    .map(|key| ((*key).to_owned(), serde_json::json!({ "key": key })))
                    .collect(),
                actions: rules
                    .iter()
                    .map(|(output, inputs)| CatalogAction {
                        action_type: "combine".to_owned(),
                        output: Some((*output).to_owned()),
                        input: inputs.iter().map(|input| (*input).to_owned()).collect(),
                    })
                    .collect(),
            },
        }
    }
}

#[async_trait]
impl TaskCatalogSource for StaticCatalogSource {
    async fn discover(&self) -> AppResult<TaskCatalog> {
        Ok(self.catalog.clone())
    }
}

/// Tracks how many executors run at once across every worker sharing it.
#[derive(Default)]
pub(crate) struct ExclusionProbe {
    active: AtomicUsize,
    max_active: AtomicUsize,
    runs: AtomicUsize,
}

impl ExclusionProbe {
    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub(crate) fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

pub(crate) enum ExecutorBehavior {
    Succeed,
    Fail,
    Panic,
}

pub(crate) struct RecordingExecutor {
    probe: Arc<ExclusionProbe>,
    behavior: ExecutorBehavior,
    work: Duration,
    orders: Mutex<Vec<TaskWorkOrder>>,
}

impl RecordingExecutor {
    pub(crate) fn new(probe: Arc<ExclusionProbe>, behavior: ExecutorBehavior) -> Self {
        Self {
            probe,
            behavior,
            work: Duration::from_millis(5),
            orders: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    pub(crate) async fn orders(&self) -> Vec<TaskWorkOrder> {
        self.orders.lock().await.clone()
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn execute(&self, order: TaskWorkOrder) -> AppResult<()> {
        let active = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(active, Ordering::SeqCst);
        self.probe.runs.fetch_add(1, Ordering::SeqCst);
        self.orders.lock().await.push(order);

        tokio::time::sleep(self.work).await;
        self.probe.active.fetch_sub(1, Ordering::SeqCst);

        match self.behavior {
            ExecutorBehavior::Succeed => Ok(()),
            ExecutorBehavior::Fail => Err(AppError::Internal("upstream unavailable".to_owned())),
            ExecutorBehavior::Panic => panic!("executor exploded"),
        }
    }
}
