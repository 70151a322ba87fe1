// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job lifecycle protocols for job types with externally stored parameters.
//!
//! The engine assigns the job id, so a parameter set can only be written once
//! the job exists. Creation therefore runs in three independently committed
//! steps:
//!
//! 1. submit the job with an empty payload and learn its id `J`
//! 2. store the parameter set under `J`
//! 3. point the job's payload at `J`
//!
//! A failure in step 1 leaves nothing behind. A failure in step 2 leaves a job
//! without parameters and is reported as [`ParamsServerError::ParametersNotAttached`].
//! A failure in step 3 is logged and tolerated: the set id is the job id, so the
//! loader finds it without the reference.

use std::sync::Arc;

use jobctl_params_core::validation::check_parameters;
use jobctl_params_core::{
	clone_job_name, JobDefinition, JobId, JobPayload, LinkState, ParameterMap, ParameterSet,
	ParameterStorageStrategy, ParamsError, Schedule, ScheduledJob,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{ParamsServerError, Result};
use crate::ports::{JobCatalog, JobChanges, JobScheduler};
use crate::store::ParameterStore;

const DEFAULT_REFERENCE_FIELD: &str = "parameter_set_id";

#[derive(Debug, Clone)]
pub struct CreateJobRequest {
	pub job_type: String,
	pub name: String,
	pub parameters: ParameterMap,
	pub schedule: Schedule,
}

#[derive(Debug, Clone)]
pub struct UpdateJobRequest {
	pub job_id: JobId,
	pub name: Option<String>,
	pub schedule: Option<Schedule>,
	/// Complete replacement for the job's parameters.
	pub parameters: ParameterMap,
}

#[derive(Debug, Clone)]
pub struct CloneJobRequest {
	pub source_job_id: JobId,
	/// Appended to the source name; today's date when absent.
	pub name_postfix: Option<String>,
	/// Defaults to the source job's schedule.
	pub schedule: Option<Schedule>,
	pub overrides: ParameterMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOutcome {
	pub job_id: JobId,
	pub strategy: ParameterStorageStrategy,
	/// For inline jobs this stays at `Submitted`.
	pub state: LinkState,
}

impl JobOutcome {
	/// Whether every step of the protocol finished.
	pub fn is_complete(&self) -> bool {
		!self.strategy.is_external() || self.state.is_linked()
	}
}

fn transition(next: std::result::Result<LinkState, String>) -> Result<LinkState> {
	next.map_err(ParamsServerError::InvalidTransition)
}

/// Current link state as seen from the engine's copy of the job.
fn observed_state(job: &ScheduledJob) -> LinkState {
	match job.payload.parameter_set_id() {
		Some(id) if id == job.id => LinkState::Linked(job.id),
		_ => LinkState::Submitted(job.id),
	}
}

pub struct ParameterLifecycle {
	scheduler: Arc<dyn JobScheduler>,
	store: Arc<dyn ParameterStore>,
	catalog: Arc<dyn JobCatalog>,
}

impl ParameterLifecycle {
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

	fn definition(&self, job_type: &str) -> Result<&JobDefinition> {
		self.catalog
			.definition(job_type)
			.ok_or_else(|| ParamsError::JobTypeNotFound(job_type.to_string()).into())
	}

	fn require_store(&self, definition: &JobDefinition) -> Result<()> {
		if self.store.is_external_storage_enabled() {
			Ok(())
		} else {
			Err(ParamsServerError::StorageUnavailable {
				job_type: definition.job_type.clone(),
			})
		}
	}

	async fn require_job(&self, job_id: JobId) -> Result<ScheduledJob> {
		self.scheduler
			.get(job_id)
			.await?
			.ok_or(ParamsServerError::JobNotFound(job_id))
	}

	#[instrument(skip(self, request), fields(job_type = %request.job_type, name = %request.name))]
	pub async fn create_with_parameters(&self, request: CreateJobRequest) -> Result<JobOutcome> {
		let definition = self.definition(&request.job_type)?;
		check_parameters(definition, &request.parameters)?;

		if !definition.uses_external_parameters() {
			let job_id = self
				.scheduler
				.submit(
					definition,
					&request.name,
					JobPayload::inline(request.parameters),
					request.schedule,
				)
				.await?;
			info!(job_id = %job_id, "created job with inline parameters");
			return Ok(JobOutcome {
				job_id,
				strategy: ParameterStorageStrategy::Inline,
				state: LinkState::Submitted(job_id),
			});
		}

		let job_type = definition.job_type.clone();
		let parameters = request.parameters;
		self.create_external(definition, &request.name, request.schedule, move |id| {
			ParameterSet::create(id, job_type, parameters)
		})
		.await
	}

	async fn create_external<F>(
		&self,
		definition: &JobDefinition,
		name: &str,
		schedule: Schedule,
		build: F,
	) -> Result<JobOutcome>
	where
		F: FnOnce(JobId) -> jobctl_params_core::Result<ParameterSet> + Send,
	{
		self.require_store(definition)?;

		let job_id = self
			.scheduler
			.submit(definition, name, JobPayload::Empty, schedule)
			.await?;
		let state = transition(LinkState::Unbound.submitted(job_id))?;
		debug!(job_id = %job_id, "job submitted with placeholder payload");

		let set = build(job_id)?;
		let state = self.attach_and_link(definition, state, set).await?;
		Ok(JobOutcome {
			job_id,
			strategy: ParameterStorageStrategy::External,
			state,
		})
	}

	async fn attach_and_link(
		&self,
		definition: &JobDefinition,
		state: LinkState,
		set: ParameterSet,
	) -> Result<LinkState> {
		let job_id = set.id;
		if let Err(e) = self.store.store(&set).await {
			warn!(job_id = %job_id, error = %e, "job created but parameters not attached");
			return Err(ParamsServerError::ParametersNotAttached {
				job_id,
				reason: e.to_string(),
			});
		}
		let state = transition(state.attached())?;

		let field = definition
			.parameter_set_field
			.as_deref()
			.unwrap_or(DEFAULT_REFERENCE_FIELD);
		let link = JobChanges::payload(JobPayload::reference(field, job_id));
		match self.scheduler.update(job_id, link).await {
			Ok(()) => {
				let state = transition(state.linked())?;
				info!(job_id = %job_id, "parameter set linked");
				Ok(state)
			}
			Err(e) => {
				warn!(
					job_id = %job_id,
					error = %e,
					"parameter set stored but job payload not linked"
				);
				Ok(state)
			}
		}
	}

	/// Replace a job's parameters. The old set is deleted first; the new one is
	/// stored under the same id after the engine accepts the update.
	#[instrument(skip(self, request), fields(job_id = %request.job_id))]
	pub async fn update_with_parameters(&self, request: UpdateJobRequest) -> Result<JobOutcome> {
		let job = self.require_job(request.job_id).await?;
		let definition = self.definition(&job.job_type)?;
		check_parameters(definition, &request.parameters)?;

		if !definition.uses_external_parameters() {
			let changes = JobChanges {
				name: request.name,
				schedule: request.schedule,
				payload: JobPayload::inline(request.parameters),
			};
			self.scheduler.update(job.id, changes).await?;
			info!("updated job with inline parameters");
			return Ok(JobOutcome {
				job_id: job.id,
				strategy: ParameterStorageStrategy::Inline,
				state: LinkState::Submitted(job.id),
			});
		}

		self.require_store(definition)?;
		let current = observed_state(&job);

		self.store.delete_by_id(job.id).await?;
		let changes = JobChanges {
			name: request.name,
			schedule: request.schedule,
			payload: JobPayload::Empty,
		};
		if let Err(e) = self.scheduler.update(job.id, changes).await {
			warn!(error = %e, "engine rejected update after parameter set was removed");
			return Err(e);
		}
		let state = transition(current.submitted(job.id))?;

		let set = ParameterSet::create(job.id, definition.job_type.clone(), request.parameters)?;
		let state = self.attach_and_link(definition, state, set).await?;
		Ok(JobOutcome {
			job_id: job.id,
			strategy: ParameterStorageStrategy::External,
			state,
		})
	}

	/// Create a new job from an existing one. The new job gets its own copy of
	/// the source's parameters with `overrides` applied.
	#[instrument(skip(self, request), fields(source_job_id = %request.source_job_id))]
	pub async fn clone_with_overrides(&self, request: CloneJobRequest) -> Result<JobOutcome> {
		let source = self.require_job(request.source_job_id).await?;
		let definition = self.definition(&source.job_type)?;
		let name = clone_job_name(&source.name, request.name_postfix.as_deref());
		let schedule = request.schedule.unwrap_or(source.schedule);

		if !definition.uses_external_parameters() {
			let mut parameters = source.payload.inline_parameters();
			parameters.extend(request.overrides);
			return self
				.create_with_parameters(CreateJobRequest {
					job_type: source.job_type,
					name,
					parameters,
					schedule,
				})
				.await;
		}

		self.require_store(definition)?;
		let source_set = self
			.store
			.find_by_id(source.id)
			.await?
			.ok_or(ParamsError::ParameterSetNotFound(source.id))?;

		let mut merged = source_set.parameters.clone();
		merged.extend(request.overrides.clone());
		check_parameters(definition, &merged)?;

		let overrides = request.overrides;
		self.create_external(definition, &name, schedule, move |id| {
			source_set.clone_for(id, &overrides)
		})
		.await
	}

	/// Delete a job and its parameter set. Safe to repeat; a job that is
	/// already gone still gets its parameter set removed.
	#[instrument(skip(self), fields(job_id = %job_id))]
	pub async fn delete_and_cleanup(&self, job_id: JobId) -> Result<()> {
		let job = self.scheduler.get(job_id).await?;
		let external = job
			.as_ref()
			.map(|j| self.catalog.strategy_for(&j.job_type).is_external())
			.unwrap_or(true);

		if external && self.store.is_external_storage_enabled() {
			if let Err(e) = self.store.delete_by_id(job_id).await {
				warn!(error = %e, "failed to delete parameter set, leaving orphan");
			}
		}

		match job {
			Some(_) => {
				self.scheduler.delete(job_id).await?;
				info!("deleted job");
			}
			None => debug!("job already gone"),
		}
		Ok(())
	}

	/// Hook for engines that delete jobs on their own. Failures are logged.
	#[instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type))]
	pub async fn on_job_deleted(&self, job: &ScheduledJob) {
		if !self.catalog.strategy_for(&job.job_type).is_external()
			|| !self.store.is_external_storage_enabled()
		{
			return;
		}
		match self.store.delete_by_id(job.id).await {
			Ok(()) => debug!("removed parameter set of deleted job"),
			Err(e) => warn!(error = %e, "failed to remove parameter set of deleted job"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ports::StaticJobCatalog;
	use crate::store::DisabledParameterStore;
	use crate::testing::{create_test_store, InMemoryJobScheduler, RecordingStore, StoreCall};
	use chrono::{TimeZone, Utc};
	use jobctl_params_core::{JobParameter, JobParameterType, ParameterValue};

	struct Fixture {
		scheduler: Arc<InMemoryJobScheduler>,
		store: Arc<RecordingStore>,
		lifecycle: ParameterLifecycle,
	}

	fn catalog() -> Arc<StaticJobCatalog> {
		Arc::new(StaticJobCatalog::new([
			JobDefinition::external(
				"Report",
				vec![
					JobParameter::new("title", JobParameterType::String).required(),
					JobParameter::new("rows", JobParameterType::Integer),
				],
			),
			JobDefinition::external(
				"Matrix",
				vec![
					JobParameter::new("x", JobParameterType::Integer),
					JobParameter::new("y", JobParameterType::Integer),
				],
			),
			JobDefinition::inline(
				"Ping",
				vec![JobParameter::new("host", JobParameterType::String).required()],
			),
		]))
	}

	async fn fixture() -> Fixture {
		let scheduler = Arc::new(InMemoryJobScheduler::new());
		let store = Arc::new(RecordingStore::new(Arc::new(create_test_store().await)));
		let lifecycle = ParameterLifecycle::new(scheduler.clone(), store.clone(), catalog());
		Fixture {
			scheduler,
			store,
			lifecycle,
		}
	}

	fn params(pairs: &[(&str, ParameterValue)]) -> ParameterMap {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.clone()))
			.collect()
	}

	fn at() -> Schedule {
		Schedule::At {
			at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
		}
	}

	fn report(title: &str) -> CreateJobRequest {
		CreateJobRequest {
			job_type: "Report".to_string(),
			name: "quarterly".to_string(),
			parameters: params(&[
				("title", ParameterValue::from(title)),
				("rows", ParameterValue::Integer(500)),
			]),
			schedule: at(),
		}
	}

	#[tokio::test]
	async fn create_aligns_set_id_with_job_id() {
		let f = fixture().await;
		let outcome = f.lifecycle.create_with_parameters(report("Q1")).await.unwrap();

		assert_eq!(outcome.state, LinkState::Linked(outcome.job_id));
		assert!(outcome.is_complete());

		let job = f.scheduler.job(outcome.job_id).await.unwrap();
		assert_eq!(
			job.payload,
			JobPayload::reference("parameter_set_id", outcome.job_id)
		);
		let set = f.store.find_by_id(outcome.job_id).await.unwrap().unwrap();
		assert_eq!(set.id, outcome.job_id);
		assert_eq!(set.get_string("title").as_deref(), Some("Q1"));
	}

	#[tokio::test]
	async fn inline_jobs_never_touch_the_store() {
		let f = fixture().await;
		let outcome = f
			.lifecycle
			.create_with_parameters(CreateJobRequest {
				job_type: "Ping".to_string(),
				name: "ping".to_string(),
				parameters: params(&[("host", ParameterValue::from("db-1"))]),
				schedule: Schedule::ExternalTrigger,
			})
			.await
			.unwrap();

		assert_eq!(outcome.strategy, ParameterStorageStrategy::Inline);
		assert!(outcome.is_complete());
		f.lifecycle.delete_and_cleanup(outcome.job_id).await.unwrap();
		assert!(f.store.calls().await.is_empty());
	}

	#[tokio::test]
	async fn disabled_store_fails_fast_for_external_types() {
		let scheduler = Arc::new(InMemoryJobScheduler::new());
		let lifecycle = ParameterLifecycle::new(
			scheduler.clone(),
			Arc::new(DisabledParameterStore),
			catalog(),
		);

		let err = lifecycle.create_with_parameters(report("Q1")).await.unwrap_err();
		assert!(matches!(err, ParamsServerError::StorageUnavailable { .. }));
		assert_eq!(scheduler.job_count().await, 0);
	}

	#[tokio::test]
	async fn unknown_job_type_is_rejected() {
		let f = fixture().await;
		let mut request = report("Q1");
		request.job_type = "Missing".to_string();

		let err = f.lifecycle.create_with_parameters(request).await.unwrap_err();
		assert!(matches!(
			err,
			ParamsServerError::Params(ParamsError::JobTypeNotFound(_))
		));
	}

	#[tokio::test]
	async fn invalid_parameters_submit_nothing() {
		let f = fixture().await;
		let mut request = report("Q1");
		request.parameters.remove("title");

		let err = f.lifecycle.create_with_parameters(request).await.unwrap_err();
		assert!(matches!(err, ParamsServerError::Params(ParamsError::Validation(_))));
		assert_eq!(f.scheduler.job_count().await, 0);
	}

	#[tokio::test]
	async fn submit_failure_aborts_cleanly() {
		let f = fixture().await;
		f.scheduler.fail_next_submits(1);

		let err = f.lifecycle.create_with_parameters(report("Q1")).await.unwrap_err();
		assert!(matches!(err, ParamsServerError::Scheduler(_)));
		assert_eq!(f.scheduler.job_count().await, 0);
		assert!(f.store.calls().await.is_empty());
	}

	#[tokio::test]
	async fn store_failure_is_reported_as_not_attached() {
		let f = fixture().await;
		f.store.fail_next_stores(1);

		let err = f.lifecycle.create_with_parameters(report("Q1")).await.unwrap_err();
		let ParamsServerError::ParametersNotAttached { job_id, .. } = err else {
			panic!("expected ParametersNotAttached");
		};

		let job = f.scheduler.job(job_id).await.unwrap();
		assert_eq!(job.payload, JobPayload::Empty);
		assert!(f.store.find_by_id(job_id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn link_failure_is_tolerated() {
		let f = fixture().await;
		f.scheduler.fail_next_updates(1);

		let outcome = f.lifecycle.create_with_parameters(report("Q1")).await.unwrap();
		assert_eq!(outcome.state, LinkState::ParametersAttached(outcome.job_id));
		assert!(!outcome.is_complete());
		assert!(f.store.find_by_id(outcome.job_id).await.unwrap().is_some());
	}

	#[tokio::test]
	async fn update_replaces_instead_of_merging() {
		let f = fixture().await;
		let created = f
			.lifecycle
			.create_with_parameters(CreateJobRequest {
				job_type: "Matrix".to_string(),
				name: "matrix".to_string(),
				parameters: params(&[
					("x", ParameterValue::Integer(1)),
					("y", ParameterValue::Integer(2)),
				]),
				schedule: at(),
			})
			.await
			.unwrap();

		let updated = f
			.lifecycle
			.update_with_parameters(UpdateJobRequest {
				job_id: created.job_id,
				name: Some("matrix-v2".to_string()),
				schedule: None,
				parameters: params(&[("x", ParameterValue::Integer(9))]),
			})
			.await
			.unwrap();

		assert_eq!(updated.job_id, created.job_id);
		assert_eq!(updated.state, LinkState::Linked(created.job_id));
		let set = f.store.find_by_id(created.job_id).await.unwrap().unwrap();
		assert_eq!(set.parameters, params(&[("x", ParameterValue::Integer(9))]));
		assert_eq!(
			f.scheduler.job(created.job_id).await.unwrap().name,
			"matrix-v2"
		);
	}

	#[tokio::test]
	async fn update_of_missing_job_is_job_not_found() {
		let f = fixture().await;
		let err = f
			.lifecycle
			.update_with_parameters(UpdateJobRequest {
				job_id: JobId::new(),
				name: None,
				schedule: None,
				parameters: ParameterMap::new(),
			})
			.await
			.unwrap_err();
		assert!(err.is_job_missing());
	}

	#[tokio::test]
	async fn clone_copies_without_sharing() {
		let f = fixture().await;
		let source = f.lifecycle.create_with_parameters(report("Q1")).await.unwrap();

		let cloned = f
			.lifecycle
			.clone_with_overrides(CloneJobRequest {
				source_job_id: source.job_id,
				name_postfix: Some("copy".to_string()),
				schedule: None,
				overrides: params(&[("title", ParameterValue::from("Q1-copy"))]),
			})
			.await
			.unwrap();

		assert_ne!(cloned.job_id, source.job_id);
		assert_eq!(cloned.state, LinkState::Linked(cloned.job_id));

		let source_set = f.store.find_by_id(source.job_id).await.unwrap().unwrap();
		let cloned_set = f.store.find_by_id(cloned.job_id).await.unwrap().unwrap();
		assert_eq!(source_set.get_string("title").as_deref(), Some("Q1"));
		assert_eq!(cloned_set.get_string("title").as_deref(), Some("Q1-copy"));
		assert_eq!(cloned_set.get_integer("rows"), Some(500));

		let job = f.scheduler.job(cloned.job_id).await.unwrap();
		assert_eq!(job.name, "quarterly-copy");
		assert_eq!(job.schedule, at());
	}

	#[tokio::test]
	async fn clone_validates_overrides() {
		let f = fixture().await;
		let source = f.lifecycle.create_with_parameters(report("Q1")).await.unwrap();

		let err = f
			.lifecycle
			.clone_with_overrides(CloneJobRequest {
				source_job_id: source.job_id,
				name_postfix: None,
				schedule: None,
				overrides: params(&[("rows", ParameterValue::from("lots"))]),
			})
			.await
			.unwrap_err();
		assert!(matches!(err, ParamsServerError::Params(ParamsError::Validation(_))));
		assert_eq!(f.scheduler.job_count().await, 1);
	}

	#[tokio::test]
	async fn clone_without_source_set_is_parameter_set_missing() {
		let f = fixture().await;
		let source = f.lifecycle.create_with_parameters(report("Q1")).await.unwrap();
		f.store.delete_by_id(source.job_id).await.unwrap();

		let err = f
			.lifecycle
			.clone_with_overrides(CloneJobRequest {
				source_job_id: source.job_id,
				name_postfix: None,
				schedule: None,
				overrides: ParameterMap::new(),
			})
			.await
			.unwrap_err();
		assert!(err.is_parameter_set_missing());
	}

	#[tokio::test]
	async fn delete_is_idempotent() {
		let f = fixture().await;
		let outcome = f.lifecycle.create_with_parameters(report("Q1")).await.unwrap();

		f.lifecycle.delete_and_cleanup(outcome.job_id).await.unwrap();
		f.lifecycle.delete_and_cleanup(outcome.job_id).await.unwrap();

		assert!(f.scheduler.job(outcome.job_id).await.is_none());
		assert!(f.store.find_by_id(outcome.job_id).await.unwrap().is_none());
		let deletes = f
			.store
			.calls()
			.await
			.into_iter()
			.filter(|c| *c == StoreCall::Delete(outcome.job_id))
			.count();
		assert_eq!(deletes, 2);
	}

	#[tokio::test]
	async fn engine_side_deletion_hook_removes_set() {
		let f = fixture().await;
		let outcome = f.lifecycle.create_with_parameters(report("Q1")).await.unwrap();
		let job = f.scheduler.remove(outcome.job_id).await.unwrap();

		f.lifecycle.on_job_deleted(&job).await;
		assert!(f.store.find_by_id(outcome.job_id).await.unwrap().is_none());
	}
}
