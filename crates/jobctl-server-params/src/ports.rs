// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Interfaces consumed from the scheduling engine and the job catalog.

use std::collections::HashMap;

use async_trait::async_trait;
use jobctl_params_core::{
	JobDefinition, JobId, JobPayload, ParameterStorageStrategy, Schedule, ScheduledJob,
};

use crate::error::Result;

/// Changes applied to an existing job. `None` leaves the field as it is; the
/// payload is always replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobChanges {
	pub name: Option<String>,
	pub schedule: Option<Schedule>,
	pub payload: JobPayload,
}

impl JobChanges {
	/// Replace only the payload.
	pub fn payload(payload: JobPayload) -> Self {
		Self {
			name: None,
			schedule: None,
			payload,
		}
	}
}

/// The scheduling engine. It assigns job ids; callers never choose them.
#[async_trait]
pub trait JobScheduler: Send + Sync {
	async fn submit(
		&self,
		definition: &JobDefinition,
		name: &str,
		payload: JobPayload,
		schedule: Schedule,
	) -> Result<JobId>;

	async fn update(&self, job_id: JobId, changes: JobChanges) -> Result<()>;

	async fn delete(&self, job_id: JobId) -> Result<()>;

	async fn get(&self, job_id: JobId) -> Result<Option<ScheduledJob>>;
}

/// Registry of job types.
pub trait JobCatalog: Send + Sync {
	fn definition(&self, job_type: &str) -> Option<&JobDefinition>;

	/// Storage strategy for `job_type`. Unknown types are treated as inline.
	fn strategy_for(&self, job_type: &str) -> ParameterStorageStrategy {
		self.definition(job_type)
			.map(|d| d.storage)
			.unwrap_or_default()
	}
}

/// Catalog built once from a fixed list of definitions.
#[derive(Debug, Clone, Default)]
pub struct StaticJobCatalog {
	definitions: HashMap<String, JobDefinition>,
}

impl StaticJobCatalog {
	pub fn new(definitions: impl IntoIterator<Item = JobDefinition>) -> Self {
		Self {
			definitions: definitions
				.into_iter()
				.map(|d| (d.job_type.clone(), d))
				.collect(),
		}
	}

	pub fn len(&self) -> usize {
		self.definitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.definitions.is_empty()
	}
}

impl JobCatalog for StaticJobCatalog {
	fn definition(&self, job_type: &str) -> Option<&JobDefinition> {
		self.definitions.get(job_type)
	}
}
