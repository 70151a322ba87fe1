// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wires the store, orchestrator, loader and sweeper from configuration.

use std::sync::Arc;

use jobctl_server_config::ServerConfig;
use sqlx::AnyPool;
use tracing::info;

use crate::error::Result;
use crate::lifecycle::ParameterLifecycle;
use crate::loader::ParameterSetLoader;
use crate::pool::create_pool;
use crate::ports::{JobCatalog, JobScheduler};
use crate::store::{DisabledParameterStore, ParameterStore, SqlParameterStore};
use crate::sweep::ParameterSetSweeper;

pub struct ParamsRuntime {
	/// Present only when external storage is enabled.
	pub pool: Option<AnyPool>,
	pub store: Arc<dyn ParameterStore>,
	pub lifecycle: ParameterLifecycle,
	pub loader: ParameterSetLoader,
	pub sweeper: ParameterSetSweeper,
}

impl ParamsRuntime {
	/// Build everything from `config`. With storage enabled this connects to
	/// the database and creates the parameter set table if it is missing.
	pub async fn from_config(
		config: &ServerConfig,
		scheduler: Arc<dyn JobScheduler>,
		catalog: Arc<dyn JobCatalog>,
	) -> Result<Self> {
		let storage = &config.parameter_storage;

		let (pool, store): (Option<AnyPool>, Arc<dyn ParameterStore>) = if storage.enabled {
			let pool = create_pool(&config.database.url, config.database.max_connections).await?;
			let store = SqlParameterStore::new(pool.clone());
			store.ensure_schema().await?;
			(Some(pool), Arc::new(store) as Arc<dyn ParameterStore>)
		} else {
			(None, Arc::new(DisabledParameterStore) as Arc<dyn ParameterStore>)
		};

		info!(
			external_storage = store.is_external_storage_enabled(),
			cleanup_enabled = storage.cleanup_enabled,
			retention_days = storage.retention_days,
			"parameter storage ready"
		);

		Ok(Self {
			pool,
			lifecycle: ParameterLifecycle::new(scheduler.clone(), store.clone(), catalog.clone()),
			loader: ParameterSetLoader::new(scheduler.clone(), store.clone(), catalog),
			sweeper: ParameterSetSweeper::new(
				store.clone(),
				scheduler,
				storage.cleanup_enabled,
				storage.retention_days,
			),
			store,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ParamsServerError;
	use crate::lifecycle::CreateJobRequest;
	use crate::ports::StaticJobCatalog;
	use crate::testing::InMemoryJobScheduler;
	use jobctl_params_core::{
		JobDefinition, JobParameter, JobParameterType, ParameterMap, ParameterValue, Schedule,
	};
	use jobctl_server_config::{DatabaseConfig, ParameterStorageConfig};

	fn catalog() -> Arc<StaticJobCatalog> {
		Arc::new(StaticJobCatalog::new([JobDefinition::external(
			"Report",
			vec![JobParameter::new("title", JobParameterType::String)],
		)]))
	}

	fn request() -> CreateJobRequest {
		let mut parameters = ParameterMap::new();
		parameters.insert("title".into(), ParameterValue::from("Q1"));
		CreateJobRequest {
			job_type: "Report".into(),
			name: "r".into(),
			parameters,
			schedule: Schedule::ExternalTrigger,
		}
	}

	#[tokio::test]
	async fn enabled_storage_round_trips() {
		let dir = tempfile::tempdir().unwrap();
		let config = ServerConfig {
			database: DatabaseConfig {
				url: format!("sqlite:{}", dir.path().join("jobctl.db").display()),
				max_connections: 1,
			},
			..Default::default()
		};

		let runtime = ParamsRuntime::from_config(
			&config,
			Arc::new(InMemoryJobScheduler::new()),
			catalog(),
		)
		.await
		.unwrap();

		assert!(runtime.pool.is_some());
		let outcome = runtime.lifecycle.create_with_parameters(request()).await.unwrap();
		let params = runtime.loader.load_parameters(outcome.job_id).await.unwrap();
		assert_eq!(params, request().parameters);
	}

	#[tokio::test]
	async fn disabled_storage_rejects_external_jobs() {
		let config = ServerConfig {
			parameter_storage: ParameterStorageConfig {
				enabled: false,
				..Default::default()
			},
			..Default::default()
		};

		let runtime = ParamsRuntime::from_config(
			&config,
			Arc::new(InMemoryJobScheduler::new()),
			catalog(),
		)
		.await
		.unwrap();

		assert!(runtime.pool.is_none());
		assert!(!runtime.store.is_external_storage_enabled());
		let err = runtime
			.lifecycle
			.create_with_parameters(request())
			.await
			.unwrap_err();
		assert!(matches!(err, ParamsServerError::StorageUnavailable { .. }));
	}
}
