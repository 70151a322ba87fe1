// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job-side types: identities, payloads, schedules and the link state machine.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ParameterMap;

/// Identity assigned to a job by the scheduling engine. A parameter set owned
/// by the job carries the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for JobId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for JobId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// What the scheduling engine stores as the job's invocation arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
	/// Placeholder used between submission and linking.
	Empty,
	/// Parameters carried by the job itself.
	Inline { parameters: ParameterMap },
	/// Reference to an externally stored parameter set.
	Reference { field: String, parameter_set_id: JobId },
}

impl JobPayload {
	pub fn inline(parameters: ParameterMap) -> Self {
		Self::Inline { parameters }
	}

	pub fn reference(field: impl Into<String>, parameter_set_id: JobId) -> Self {
		Self::Reference {
			field: field.into(),
			parameter_set_id,
		}
	}

	/// Parameters carried inline, or an empty map for any other payload.
	pub fn inline_parameters(&self) -> ParameterMap {
		match self {
			Self::Inline { parameters } => parameters.clone(),
			Self::Empty | Self::Reference { .. } => ParameterMap::new(),
		}
	}

	pub fn parameter_set_id(&self) -> Option<JobId> {
		match self {
			Self::Reference {
				parameter_set_id, ..
			} => Some(*parameter_set_id),
			_ => None,
		}
	}
}

/// When a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
	At { at: DateTime<Utc> },
	/// Parked until triggered from outside.
	ExternalTrigger,
}

impl Schedule {
	/// The instant handed to the engine. Externally triggered jobs are parked on
	/// 2999-12-31 (local midnight).
	pub fn effective_time(&self) -> DateTime<Utc> {
		match self {
			Self::At { at } => *at,
			Self::ExternalTrigger => external_trigger_date(),
		}
	}

	pub fn is_external_trigger(&self) -> bool {
		matches!(self, Self::ExternalTrigger)
	}
}

fn external_trigger_date() -> DateTime<Utc> {
	let midnight = NaiveDate::from_ymd_opt(2999, 12, 31)
		.and_then(|d| d.and_hms_opt(0, 0, 0))
		.unwrap_or_default();
	Local
		.from_local_datetime(&midnight)
		.earliest()
		.map(|dt| dt.with_timezone(&Utc))
		.unwrap_or_else(|| midnight.and_utc())
}

/// A job as reported by the scheduling engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
	pub id: JobId,
	pub job_type: String,
	pub name: String,
	pub payload: JobPayload,
	pub schedule: Schedule,
}

/// Progress of a job through the external-parameter protocol.
///
/// `Unbound -> Submitted -> ParametersAttached -> Linked`; updates and deletes
/// re-enter `Submitted` before attaching again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "job_id", rename_all = "snake_case")]
pub enum LinkState {
	Unbound,
	Submitted(JobId),
	ParametersAttached(JobId),
	Linked(JobId),
}

impl LinkState {
	pub fn job_id(&self) -> Option<JobId> {
		match self {
			Self::Unbound => None,
			Self::Submitted(id) | Self::ParametersAttached(id) | Self::Linked(id) => Some(*id),
		}
	}

	/// Engine accepted the job (or the update) under `id`. Once bound, the id
	/// never changes.
	pub fn submitted(self, id: JobId) -> Result<Self, String> {
		match self {
			Self::Unbound => Ok(Self::Submitted(id)),
			Self::Submitted(current) | Self::ParametersAttached(current) | Self::Linked(current)
				if current == id =>
			{
				Ok(Self::Submitted(id))
			}
			other => Err(format!("cannot submit {id} from {other}")),
		}
	}

	pub fn attached(self) -> Result<Self, String> {
		match self {
			Self::Submitted(id) => Ok(Self::ParametersAttached(id)),
			other => Err(format!("cannot attach parameters from {other}")),
		}
	}

	pub fn linked(self) -> Result<Self, String> {
		match self {
			Self::ParametersAttached(id) => Ok(Self::Linked(id)),
			other => Err(format!("cannot link from {other}")),
		}
	}

	pub fn is_linked(&self) -> bool {
		matches!(self, Self::Linked(_))
	}
}

impl fmt::Display for LinkState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Unbound => write!(f, "unbound"),
			Self::Submitted(id) => write!(f, "submitted({id})"),
			Self::ParametersAttached(id) => write!(f, "parameters_attached({id})"),
			Self::Linked(id) => write!(f, "linked({id})"),
		}
	}
}

/// Name for a cloned job: `<base>-<postfix>`, with today's `yyyyMMdd` when no
/// postfix is given.
pub fn clone_job_name(base: &str, postfix: Option<&str>) -> String {
	match postfix.map(str::trim).filter(|p| !p.is_empty()) {
		Some(postfix) => format!("{base}-{postfix}"),
		None => format!("{base}-{}", Local::now().format("%Y%m%d")),
	}
}
