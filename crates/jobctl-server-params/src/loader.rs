// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolves a job's parameters when it runs.

use std::sync::Arc;

use jobctl_params_core::{
	JobId, ParameterMap, ParameterSet, ParameterStorageStrategy, ParamsError, ScheduledJob,
};
use tracing::instrument;

use crate::error::{ParamsServerError, Result};
use crate::ports::{JobCatalog, JobScheduler};
use crate::store::ParameterStore;

pub struct ParameterSetLoader {
	scheduler: Arc<dyn JobScheduler>,
	store: Arc<dyn ParameterStore>,
	catalog: Arc<dyn JobCatalog>,
}

impl ParameterSetLoader {
	pub fn new(
		scheduler: Arc<dyn JobScheduler>,
		store: Arc<dyn ParameterStore>,
		catalog: Arc<dyn JobCatalog>,
	) -> Self {
		Self {
			scheduler,
			store,
			catalog,
		}
	}

	/// Parameters of `job_id`. A missing job is [`ParamsServerError::JobNotFound`];
	/// an external job without a stored set is `ParameterSetNotFound`.
	#[instrument(skip(self), fields(job_id = %job_id))]
	pub async fn load_parameters(&self, job_id: JobId) -> Result<ParameterMap> {
		let job = self
			.scheduler
			.get(job_id)
			.await?
			.ok_or(ParamsServerError::JobNotFound(job_id))?;
		self.resolve(&job).await
	}

	/// Parameters of an already fetched job. External sets are looked up by the
	/// job's own id; the payload reference is not consulted.
	pub async fn resolve(&self, job: &ScheduledJob) -> Result<ParameterMap> {
		match self.catalog.strategy_for(&job.job_type) {
			ParameterStorageStrategy::Inline => Ok(job.payload.inline_parameters()),
			ParameterStorageStrategy::External => {
				Ok(self.find_external(job).await?.parameters)
			}
		}
	}

	/// The stored set of an external job, for callers that want the typed
	/// accessors or the timestamps.
	#[instrument(skip(self), fields(job_id = %job_id))]
	pub async fn load_parameter_set(&self, job_id: JobId) -> Result<ParameterSet> {
		let job = self
			.scheduler
			.get(job_id)
			.await?
			.ok_or(ParamsServerError::JobNotFound(job_id))?;
		self.find_external(&job).await
	}

	async fn find_external(&self, job: &ScheduledJob) -> Result<ParameterSet> {
		if !self.store.is_external_storage_enabled() {
			return Err(ParamsServerError::StorageUnavailable {
				job_type: job.job_type.clone(),
			});
		}
		self.store
			.find_by_id(job.id)
			.await?
			.ok_or_else(|| ParamsError::ParameterSetNotFound(job.id).into())
	}
}
