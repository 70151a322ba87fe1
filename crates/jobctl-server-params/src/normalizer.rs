// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-backend handling of the JSON-valued `parameters_json` column.
//!
//! Backends disagree on three things: whether a JSON column accepts a plain
//! text bind (Postgres wants `JSONB`, MySQL wants `JSON`), what type comes back
//! on read (native JSON rather than text), and whether a string written to a
//! JSON column is stored as a JSON string literal, which reads back double
//! encoded (`"{\"a\":1}"`). One [`JsonNormalizer`] per dialect hides all of it.
//! The dialect is probed once per pool from the connection metadata.

use std::fmt;
use std::sync::Arc;

use jobctl_params_core::ParamsError;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
	Sqlite,
	Postgres,
	MySql,
	/// Unrecognized backend; treated as plain text with `?` placeholders.
	Generic,
}

impl Dialect {
	/// Map the name reported by the driver (`AnyConnection::backend_name`).
	pub fn from_backend_name(name: &str) -> Self {
		match name.to_ascii_lowercase().as_str() {
			"sqlite" => Self::Sqlite,
			"postgresql" | "postgres" => Self::Postgres,
			"mysql" | "mariadb" => Self::MySql,
			_ => Self::Generic,
		}
	}

	pub fn normalizer(self) -> Arc<dyn JsonNormalizer> {
		match self {
			Self::Sqlite => Arc::new(SqliteNormalizer),
			Self::Postgres => Arc::new(PostgresNormalizer),
			Self::MySql => Arc::new(MySqlNormalizer),
			Self::Generic => Arc::new(GenericNormalizer),
		}
	}
}

impl fmt::Display for Dialect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Sqlite => write!(f, "sqlite"),
			Self::Postgres => write!(f, "postgres"),
			Self::MySql => write!(f, "mysql"),
			Self::Generic => write!(f, "generic"),
		}
	}
}

pub trait JsonNormalizer: Send + Sync + fmt::Debug {
	fn dialect(&self) -> Dialect;

	/// Bind placeholder for the 1-based parameter `index`.
	fn placeholder(&self, _index: usize) -> String {
		"?".to_string()
	}

	/// SQL fragment binding a JSON text value at `index`.
	fn write_binding(&self, index: usize) -> String {
		self.placeholder(index)
	}

	/// SQL expression that reads `column` back as text.
	fn read_expression(&self, column: &str) -> String {
		column.to_string()
	}

	/// Column type used for `parameters_json` in the schema.
	fn json_column_type(&self) -> &'static str {
		"TEXT"
	}

	/// Whether reads may see a JSON document wrapped in a JSON string.
	fn unwraps_double_encoding(&self) -> bool {
		false
	}

	/// Read `column` from `row` and return the JSON document it holds.
	///
	/// Malformed JSON is an error, never an empty document.
	fn read_and_normalize(&self, row: &AnyRow, column: &str) -> Result<serde_json::Value> {
		let raw: String = row.try_get(column)?;
		Ok(self.normalize_text(&raw)?)
	}

	fn normalize_text(&self, raw: &str) -> std::result::Result<serde_json::Value, ParamsError> {
		let trimmed = raw.trim();
		if self.unwraps_double_encoding() && is_quoted(trimmed) {
			let inner: String = serde_json::from_str(trimmed)?;
			return Ok(serde_json::from_str(&inner)?);
		}
		Ok(serde_json::from_str(trimmed)?)
	}

	/// DDL creating the parameter set table and its access-time index.
	fn schema_statements(&self) -> Vec<String> {
		vec![
			create_table_statement(self.json_column_type()),
			"CREATE INDEX IF NOT EXISTS idx_job_parameter_sets_last_accessed_at \
			 ON job_parameter_sets (last_accessed_at)"
				.to_string(),
		]
	}
}

fn is_quoted(s: &str) -> bool {
	s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
}

fn create_table_statement(json_type: &str) -> String {
	format!(
		"CREATE TABLE IF NOT EXISTS job_parameter_sets (\
		 id VARCHAR(36) PRIMARY KEY, \
		 job_type VARCHAR(255) NOT NULL, \
		 parameters_json {json_type} NOT NULL, \
		 created_at VARCHAR(40) NOT NULL, \
		 last_accessed_at VARCHAR(40) NOT NULL)"
	)
}

#[derive(Debug)]
pub struct SqliteNormalizer;

impl JsonNormalizer for SqliteNormalizer {
	fn dialect(&self) -> Dialect {
		Dialect::Sqlite
	}

	fn unwraps_double_encoding(&self) -> bool {
		true
	}
}

#[derive(Debug)]
pub struct PostgresNormalizer;

impl JsonNormalizer for PostgresNormalizer {
	fn dialect(&self) -> Dialect {
		Dialect::Postgres
	}

	fn placeholder(&self, index: usize) -> String {
		format!("${index}")
	}

	fn write_binding(&self, index: usize) -> String {
		format!("CAST(${index} AS JSONB)")
	}

	fn read_expression(&self, column: &str) -> String {
		format!("{column}::text")
	}

	fn json_column_type(&self) -> &'static str {
		"JSONB"
	}
}

#[derive(Debug)]
pub struct MySqlNormalizer;

impl JsonNormalizer for MySqlNormalizer {
	fn dialect(&self) -> Dialect {
		Dialect::MySql
	}

	fn write_binding(&self, _index: usize) -> String {
		"CAST(? AS JSON)".to_string()
	}

	fn read_expression(&self, column: &str) -> String {
		format!("CAST({column} AS CHAR)")
	}

	fn json_column_type(&self) -> &'static str {
		"JSON"
	}

	// MySQL has no CREATE INDEX IF NOT EXISTS; the index goes in the table DDL.
	fn schema_statements(&self) -> Vec<String> {
		vec![
			"CREATE TABLE IF NOT EXISTS job_parameter_sets (\
			 id VARCHAR(36) PRIMARY KEY, \
			 job_type VARCHAR(255) NOT NULL, \
			 parameters_json JSON NOT NULL, \
			 created_at VARCHAR(40) NOT NULL, \
			 last_accessed_at VARCHAR(40) NOT NULL, \
			 INDEX idx_job_parameter_sets_last_accessed_at (last_accessed_at))"
				.to_string(),
		]
	}
}

#[derive(Debug)]
pub struct GenericNormalizer;

impl JsonNormalizer for GenericNormalizer {
	fn dialect(&self) -> Dialect {
		Dialect::Generic
	}

	fn unwraps_double_encoding(&self) -> bool {
		true
	}

	fn schema_statements(&self) -> Vec<String> {
		vec![create_table_statement(self.json_column_type())]
	}
}

/// Probe the pool's backend and pick its normalizer.
#[tracing::instrument(skip(pool))]
pub async fn detect_normalizer(pool: &AnyPool) -> Result<Arc<dyn JsonNormalizer>> {
	let conn = pool.acquire().await?;
	let backend = conn.backend_name().to_string();
	drop(conn);

	let dialect = Dialect::from_backend_name(&backend);
	tracing::info!(backend = %backend, dialect = %dialect, "detected parameter store dialect");
	Ok(dialect.normalizer())
}
