// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job type definitions as produced by the job catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a job type keeps its parameters. Fixed per job type when the catalog
/// is built; never changes at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterStorageStrategy {
	/// Parameters travel inside the job payload.
	#[default]
	Inline,
	/// Parameters live in the parameter set store, keyed by the job id.
	External,
}

impl ParameterStorageStrategy {
	pub fn is_external(&self) -> bool {
		matches!(self, Self::External)
	}
}

impl fmt::Display for ParameterStorageStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Inline => write!(f, "inline"),
			Self::External => write!(f, "external"),
		}
	}
}

impl FromStr for ParameterStorageStrategy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"inline" => Ok(Self::Inline),
			"external" => Ok(Self::External),
			_ => Err(format!("unknown parameter storage strategy: {s}")),
		}
	}
}

/// Declared type of a job parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobParameterType {
	String,
	/// Free text rendered as a text area; stored as a string.
	Multiline,
	Integer,
	Boolean,
	Date,
	DateTime,
	Enum,
	MultiEnum,
}

impl fmt::Display for JobParameterType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::String => write!(f, "string"),
			Self::Multiline => write!(f, "multiline"),
			Self::Integer => write!(f, "integer"),
			Self::Boolean => write!(f, "boolean"),
			Self::Date => write!(f, "date"),
			Self::DateTime => write!(f, "date_time"),
			Self::Enum => write!(f, "enum"),
			Self::MultiEnum => write!(f, "multi_enum"),
		}
	}
}

/// A declared job parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParameter {
	pub name: String,
	#[serde(rename = "type")]
	pub ty: JobParameterType,
	pub required: bool,
	/// Default value in its form-input representation.
	pub default_value: Option<String>,
	/// Allowed values for `Enum` and `MultiEnum` parameters.
	#[serde(default)]
	pub enum_values: Vec<String>,
}

impl JobParameter {
	pub fn new(name: impl Into<String>, ty: JobParameterType) -> Self {
		Self {
			name: name.into(),
			ty,
			required: false,
			default_value: None,
			enum_values: Vec::new(),
		}
	}

	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}

	pub fn with_default(mut self, value: impl Into<String>) -> Self {
		self.default_value = Some(value.into());
		self
	}

	pub fn with_choices<I, S>(mut self, choices: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.enum_values = choices.into_iter().map(Into::into).collect();
		self
	}
}

/// Catalog entry for one job type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
	/// Job type name, e.g. `Report`.
	pub job_type: String,
	pub parameters: Vec<JobParameter>,
	pub storage: ParameterStorageStrategy,
	/// Payload field that carries the parameter set reference for external jobs.
	pub parameter_set_field: Option<String>,
}

impl JobDefinition {
	pub fn inline(job_type: impl Into<String>, parameters: Vec<JobParameter>) -> Self {
		Self {
			job_type: job_type.into(),
			parameters,
			storage: ParameterStorageStrategy::Inline,
			parameter_set_field: None,
		}
	}

	pub fn external(job_type: impl Into<String>, parameters: Vec<JobParameter>) -> Self {
		Self {
			job_type: job_type.into(),
			parameters,
			storage: ParameterStorageStrategy::External,
			parameter_set_field: Some("parameter_set_id".to_string()),
		}
	}

	pub fn uses_external_parameters(&self) -> bool {
		self.storage.is_external()
	}

	pub fn parameter(&self, name: &str) -> Option<&JobParameter> {
		self.parameters.iter().find(|p| p.name == name)
	}

	pub fn parameter_names(&self) -> Vec<&str> {
		self.parameters.iter().map(|p| p.name.as_str()).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strategy_parses_case_insensitively() {
		assert_eq!(
			"EXTERNAL".parse::<ParameterStorageStrategy>().unwrap(),
			ParameterStorageStrategy::External
		);
		assert_eq!(
			"inline".parse::<ParameterStorageStrategy>().unwrap(),
			ParameterStorageStrategy::Inline
		);
		assert!("remote".parse::<ParameterStorageStrategy>().is_err());
	}

	#[test]
	fn default_strategy_is_inline() {
		assert_eq!(ParameterStorageStrategy::default(), ParameterStorageStrategy::Inline);
	}

	#[test]
	fn external_definition_has_reference_field() {
		let def = JobDefinition::external(
			"Report",
			vec![JobParameter::new("title", JobParameterType::String).required()],
		);
		assert!(def.uses_external_parameters());
		assert_eq!(def.parameter_set_field.as_deref(), Some("parameter_set_id"));
		assert_eq!(def.parameter_names(), vec!["title"]);
		assert!(def.parameter("title").unwrap().required);
		assert!(def.parameter("rows").is_none());
	}
}
