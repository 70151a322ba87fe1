// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Parameter set persistence.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use jobctl_params_core::{JobId, ParameterMap, ParameterSet, ParamsError};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use tokio::sync::OnceCell;
use tracing::instrument;

use crate::error::Result;
use crate::normalizer::{detect_normalizer, JsonNormalizer};

/// Storage for parameter sets, keyed by the owning job's id.
#[async_trait]
pub trait ParameterStore: Send + Sync {
	/// Insert or replace the set stored under `set.id`.
	async fn store(&self, set: &ParameterSet) -> Result<()>;

	/// Load the set for `id`, advancing its `last_accessed_at`.
	async fn find_by_id(&self, id: JobId) -> Result<Option<ParameterSet>>;

	/// Remove the set for `id`. Missing ids are not an error.
	async fn delete_by_id(&self, id: JobId) -> Result<()>;

	fn is_external_storage_enabled(&self) -> bool;

	/// Ids of sets last accessed before `cutoff`.
	async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>>;
}

fn timestamp(at: DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(column: &str, value: &str) -> std::result::Result<DateTime<Utc>, ParamsError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| ParamsError::InvalidParameterSet(format!("bad {column} '{value}': {e}")))
}

fn parse_id(value: &str) -> std::result::Result<JobId, ParamsError> {
	value
		.parse()
		.map_err(|e| ParamsError::InvalidParameterSet(format!("bad id '{value}': {e}")))
}

/// SQL-backed store working against SQLite, Postgres or MySQL through one
/// `AnyPool`.
pub struct SqlParameterStore {
	pool: AnyPool,
	normalizer: OnceCell<Arc<dyn JsonNormalizer>>,
}

impl SqlParameterStore {
	pub fn new(pool: AnyPool) -> Self {
		Self {
			pool,
			normalizer: OnceCell::new(),
		}
	}

	/// Skip backend detection and use `normalizer` for this pool.
	pub fn with_normalizer(pool: AnyPool, normalizer: Arc<dyn JsonNormalizer>) -> Self {
		Self {
			pool,
			normalizer: OnceCell::new_with(Some(normalizer)),
		}
	}

	async fn normalizer(&self) -> Result<&Arc<dyn JsonNormalizer>> {
		self.normalizer
			.get_or_try_init(|| detect_normalizer(&self.pool))
			.await
	}

	/// Create the `job_parameter_sets` table for the detected backend.
	#[instrument(skip(self))]
	pub async fn ensure_schema(&self) -> Result<()> {
		let normalizer = self.normalizer().await?;
		for statement in normalizer.schema_statements() {
			sqlx::query(&statement).execute(&self.pool).await?;
		}
		tracing::debug!(dialect = %normalizer.dialect(), "parameter set schema ready");
		Ok(())
	}

	fn decode(normalizer: &dyn JsonNormalizer, row: &AnyRow) -> Result<ParameterSet> {
		let id: String = row.try_get("id")?;
		let job_type: String = row.try_get("job_type")?;
		let created_at: String = row.try_get("created_at")?;
		let last_accessed_at: String = row.try_get("last_accessed_at")?;

		let document = normalizer.read_and_normalize(row, "parameters_json")?;
		let parameters: ParameterMap =
			serde_json::from_value(document).map_err(ParamsError::Serialization)?;

		Ok(ParameterSet {
			id: parse_id(&id)?,
			job_type,
			parameters,
			created_at: parse_timestamp("created_at", &created_at)?,
			last_accessed_at: parse_timestamp("last_accessed_at", &last_accessed_at)?,
		})
	}
}

#[async_trait]
impl ParameterStore for SqlParameterStore {
	#[instrument(skip(self, set), fields(job_id = %set.id, job_type = %set.job_type))]
	async fn store(&self, set: &ParameterSet) -> Result<()> {
		let n = self.normalizer().await?;
		let json = serde_json::to_string(&set.parameters).map_err(ParamsError::Serialization)?;
		let id = set.id.to_string();

		let delete = format!("DELETE FROM job_parameter_sets WHERE id = {}", n.placeholder(1));
		let insert = format!(
			"INSERT INTO job_parameter_sets \
			 (id, job_type, parameters_json, created_at, last_accessed_at) \
			 VALUES ({}, {}, {}, {}, {})",
			n.placeholder(1),
			n.placeholder(2),
			n.write_binding(3),
			n.placeholder(4),
			n.placeholder(5),
		);

		let mut tx = self.pool.begin().await?;
		sqlx::query(&delete).bind(&id).execute(&mut *tx).await?;
		sqlx::query(&insert)
			.bind(&id)
			.bind(&set.job_type)
			.bind(&json)
			.bind(timestamp(set.created_at))
			.bind(timestamp(set.last_accessed_at))
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		tracing::debug!(parameter_count = set.parameters.len(), "stored parameter set");
		Ok(())
	}

	#[instrument(skip(self), fields(job_id = %id))]
	async fn find_by_id(&self, id: JobId) -> Result<Option<ParameterSet>> {
		let n = self.normalizer().await?;
		let id = id.to_string();

		let touch = format!(
			"UPDATE job_parameter_sets SET last_accessed_at = {} WHERE id = {}",
			n.placeholder(1),
			n.placeholder(2),
		);
		sqlx::query(&touch)
			.bind(timestamp(Utc::now()))
			.bind(&id)
			.execute(&self.pool)
			.await?;

		let select = format!(
			"SELECT id, job_type, {} AS parameters_json, created_at, last_accessed_at \
			 FROM job_parameter_sets WHERE id = {}",
			n.read_expression("parameters_json"),
			n.placeholder(1),
		);
		let row = sqlx::query(&select)
			.bind(&id)
			.fetch_optional(&self.pool)
			.await?;

		match row {
			Some(row) => Ok(Some(Self::decode(n.as_ref(), &row)?)),
			None => {
				tracing::debug!("parameter set not found");
				Ok(None)
			}
		}
	}

	#[instrument(skip(self), fields(job_id = %id))]
	async fn delete_by_id(&self, id: JobId) -> Result<()> {
		let n = self.normalizer().await?;
		let delete = format!("DELETE FROM job_parameter_sets WHERE id = {}", n.placeholder(1));
		let result = sqlx::query(&delete)
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		tracing::debug!(rows = result.rows_affected(), "deleted parameter set");
		Ok(())
	}

	fn is_external_storage_enabled(&self) -> bool {
		true
	}

	#[instrument(skip(self))]
	async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<JobId>> {
		let n = self.normalizer().await?;
		let select = format!(
			"SELECT id FROM job_parameter_sets WHERE last_accessed_at < {} \
			 ORDER BY last_accessed_at",
			n.placeholder(1),
		);
		let rows = sqlx::query(&select)
			.bind(timestamp(cutoff))
			.fetch_all(&self.pool)
			.await?;

		let mut ids = Vec::with_capacity(rows.len());
		for row in rows {
			let id: String = row.try_get("id")?;
			ids.push(parse_id(&id)?);
		}
		Ok(ids)
	}
}

/// Store used when external parameter storage is switched off. Every call
/// succeeds without doing anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledParameterStore;

#[async_trait]
impl ParameterStore for DisabledParameterStore {
	async fn store(&self, set: &ParameterSet) -> Result<()> {
		tracing::debug!(job_id = %set.id, "parameter storage disabled, not storing");
		Ok(())
	}

	async fn find_by_id(&self, _id: JobId) -> Result<Option<ParameterSet>> {
		Ok(None)
	}

	async fn delete_by_id(&self, _id: JobId) -> Result<()> {
		Ok(())
	}

	fn is_external_storage_enabled(&self) -> bool {
		false
	}

	async fn list_stale(&self, _cutoff: DateTime<Utc>) -> Result<Vec<JobId>> {
		Ok(Vec::new())
	}
}
