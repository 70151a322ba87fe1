// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The externally stored parameter set.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ParamsError, Result};
use crate::{JobId, ParameterMap, ParameterValue};

/// Parameters of one job instance, stored outside the scheduling engine.
///
/// `id` is always the owning job's id; there is no separate lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
	pub id: JobId,
	/// Job type the set was created for. Diagnostics only.
	pub job_type: String,
	pub parameters: ParameterMap,
	pub created_at: DateTime<Utc>,
	pub last_accessed_at: DateTime<Utc>,
}

impl ParameterSet {
	/// New set for `job_id`, stamped with the current time.
	pub fn create(
		job_id: JobId,
		job_type: impl Into<String>,
		parameters: ParameterMap,
	) -> Result<Self> {
		let job_type = job_type.into();
		if job_type.trim().is_empty() {
			return Err(ParamsError::InvalidParameterSet(
				"job_type must not be blank".to_string(),
			));
		}
		let now = Utc::now();
		Ok(Self {
			id: job_id,
			job_type,
			parameters,
			created_at: now,
			last_accessed_at: now,
		})
	}

	/// Copy of this set's parameters for another job, with `overrides` applied on
	/// top. The source set is left untouched.
	pub fn clone_for(&self, job_id: JobId, overrides: &ParameterMap) -> Result<Self> {
		let mut parameters = self.parameters.clone();
		parameters.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
		Self::create(job_id, self.job_type.clone(), parameters)
	}

	pub fn get(&self, name: &str) -> Option<&ParameterValue> {
		self.parameters.get(name)
	}

	/// Any value rendered as a string.
	pub fn get_string(&self, name: &str) -> Option<String> {
		self.parameters.get(name).map(ToString::to_string)
	}

	pub fn get_integer(&self, name: &str) -> Option<i64> {
		match self.parameters.get(name)? {
			ParameterValue::Integer(i) => Some(*i),
			ParameterValue::String(s) => s.trim().parse().ok(),
			_ => None,
		}
	}

	pub fn get_boolean(&self, name: &str) -> Option<bool> {
		match self.parameters.get(name)? {
			ParameterValue::Boolean(b) => Some(*b),
			ParameterValue::String(s) => s.trim().parse().ok(),
			_ => None,
		}
	}

	pub fn get_date(&self, name: &str) -> Option<NaiveDate> {
		match self.parameters.get(name)? {
			ParameterValue::Date(d) => Some(*d),
			ParameterValue::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
			_ => None,
		}
	}

	pub fn get_date_time(&self, name: &str) -> Option<NaiveDateTime> {
		match self.parameters.get(name)? {
			ParameterValue::DateTime(dt) => Some(*dt),
			ParameterValue::String(s) => s.parse().ok(),
			_ => None,
		}
	}

	/// Values of a multi-enum parameter. A comma-separated string is split;
	/// a missing parameter yields an empty list.
	pub fn get_string_list(&self, name: &str) -> Vec<String> {
		match self.parameters.get(name) {
			Some(ParameterValue::MultiEnum(values)) => values.clone(),
			Some(ParameterValue::String(s)) | Some(ParameterValue::Enum(s)) => s
				.split(',')
				.map(str::trim)
				.filter(|s| !s.is_empty())
				.map(String::from)
				.collect(),
			_ => Vec::new(),
		}
	}
}
