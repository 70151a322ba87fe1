// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test doubles: an in-memory SQLite pool, a scheduler that keeps jobs in a
//! map, and a store wrapper that records calls. Both doubles can be told to
//! fail their next N writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobctl_params_core::{JobDefinition, JobId, JobPayload, ParameterSet, Schedule, ScheduledJob};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tokio::sync::Mutex;

use crate::error::{ParamsServerError, Result};
use crate::ports::{JobChanges, JobScheduler};
use crate::store::{ParameterStore, SqlParameterStore};

/// Single-connection in-memory SQLite pool. The connection is never recycled,
/// so the database lives as long as the pool.
pub async fn create_test_pool() -> AnyPool {
	sqlx::any::install_default_drivers();
	AnyPoolOptions::new()
		.min_connections(1)
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect("sqlite::memory:")
		.await
		.unwrap()
}

pub async fn create_test_store() -> SqlParameterStore {
	let store = SqlParameterStore::new(create_test_pool().await);
	store.ensure_schema().await.unwrap();
	store
}

fn take_fault(counter: &AtomicUsize) -> bool {
	counter
		.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
		.is_ok()
}

#[derive(Default)]
pub struct InMemoryJobScheduler {
	jobs: Mutex<HashMap<JobId, ScheduledJob>>,
	updates: Mutex<Vec<(JobId, JobChanges)>>,
	failing_submits: AtomicUsize,
	failing_updates: AtomicUsize,
}

impl InMemoryJobScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fail_next_submits(&self, n: usize) {
		self.failing_submits.store(n, Ordering::SeqCst);
	}

	pub fn fail_next_updates(&self, n: usize) {
		self.failing_updates.store(n, Ordering::SeqCst);
	}

	pub async fn job(&self, id: JobId) -> Option<ScheduledJob> {
		self.jobs.lock().await.get(&id).cloned()
	}

	pub async fn job_count(&self) -> usize {
		self.jobs.lock().await.len()
	}

	/// Every successful update, in order.
	pub async fn updates(&self) -> Vec<(JobId, JobChanges)> {
		self.updates.lock().await.clone()
	}

	/// Jobs whose schedule has come up by `now`, earliest first.
	pub async fn due_jobs(&self, now: DateTime<Utc>) -> Vec<JobId> {
		let jobs = self.jobs.lock().await;
		let mut due: Vec<_> = jobs
			.values()
			.map(|job| (job.schedule.effective_time(), job.id))
			.filter(|(at, _)| *at <= now)
			.collect();
		due.sort();
		due.into_iter().map(|(_, id)| id).collect()
	}

	/// Drop a job the way the engine would on its own, without any hook.
	pub async fn remove(&self, id: JobId) -> Option<ScheduledJob> {
		self.jobs.lock().await.remove(&id)
	}
}

#[async_trait]
impl JobScheduler for InMemoryJobScheduler {
	async fn submit(
		&self,
		definition: &JobDefinition,
		name: &str,
		payload: JobPayload,
		schedule: Schedule,
	) -> Result<JobId> {
		if take_fault(&self.failing_submits) {
			return Err(ParamsServerError::Scheduler("injected submit failure".to_string()));
		}

		let id = JobId::new();
		let job = ScheduledJob {
			id,
			job_type: definition.job_type.clone(),
			name: name.to_string(),
			payload,
			schedule,
		};
		self.jobs.lock().await.insert(id, job);
		Ok(id)
	}

	async fn update(&self, job_id: JobId, changes: JobChanges) -> Result<()> {
		if take_fault(&self.failing_updates) {
			return Err(ParamsServerError::Scheduler("injected update failure".to_string()));
		}

		let mut jobs = self.jobs.lock().await;
		let job = jobs
			.get_mut(&job_id)
			.ok_or(ParamsServerError::JobNotFound(job_id))?;
		if let Some(name) = &changes.name {
			job.name = name.clone();
		}
		if let Some(schedule) = changes.schedule {
			job.schedule = schedule;
		}
		job.payload = changes.payload.clone();
		drop(jobs);

		self.updates.lock().await.push((job_id, changes));
		Ok(())
	}

	async fn delete(&self, job_id: JobId) -> Result<()> {
		self.jobs.lock().await.remove(&job_id);
		Ok(())
	}

	async fn get(&self, job_id: JobId) -> Result<Option<ScheduledJob>> {
		Ok(self.jobs.lock().await.get(&job_id).cloned())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCall {
	Store(JobId),
	Find(JobId),
	Delete(JobId),
	ListStale,
}

/// Wraps another store and records every call made through it.
pub struct RecordingStore {
	inner: Arc<dyn ParameterStore>,
	calls: Mutex<Vec<StoreCall>>,
	failing_stores: AtomicUsize,
}

impl RecordingStore {
	pub fn new(inner: Arc<dyn ParameterStore>) -> Self {
		Self {
			inner,
			calls: Mutex::new(Vec::new()),
			failing_stores: AtomicUsize::new(0),
		}
	}

	pub fn fail_next_stores(&self, n: usize) {
		self.failing_stores.store(n, Ordering::SeqCst);
	}

	pub async fn calls(&self) -> Vec<StoreCall> {
		self.calls.lock().await.clone()
	}
}

#[async_trait]
impl ParameterStore for RecordingStore {
	async fn store(&self, set: &ParameterSet) -> Result<()> {
		self.calls.lock().await.push(StoreCall::Store(set.id));
		if take_fault(&self.failing_stores) {
			return Err(ParamsServerError::Database(sqlx::Error::PoolTimedOut));
		}
		self.inner.store(set).await
	}

	async fn find_by_id(&self, id: JobId) -> Result<Option<ParameterSet>> {
		self.calls.lock().await.push(StoreCall::Find(id));
		self.inner.find_by_id(id).await
	}

	async fn delete_by_id(&self, id: JobId) -> Result<()> {
		self.calls.lock().await.push(StoreCall::Delete(id));
		self.inner.delete_by_id(id).await
	}

	fn is_external_storage_enabled(&self) -> bool {
		self.inner.is_external_storage_enabled()
	}

	async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>> {
		self.calls.lock().await.push(StoreCall::ListStale);
		self.inner.list_stale(cutoff).await
	}
}
