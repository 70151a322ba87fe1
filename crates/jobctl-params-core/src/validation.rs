// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Parameter validation against a [`JobDefinition`].
//!
//! Two entry points: [`convert_and_validate`] turns raw form input into a typed
//! [`ParameterMap`], and [`check_parameters`] verifies an already typed map
//! (for example after clone overrides have been merged in).

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{ParamsError, Result};
use crate::{JobDefinition, JobParameter, JobParameterType, ParameterMap, ParameterValue};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Convert raw string input into typed values, collecting every problem before
/// failing. Missing optional parameters fall back to their declared default.
pub fn convert_and_validate(
	definition: &JobDefinition,
	raw: &HashMap<String, String>,
) -> Result<ParameterMap> {
	let mut errors = Vec::new();
	let mut converted = ParameterMap::new();

	for param in &definition.parameters {
		let value = raw
			.get(&param.name)
			.map(String::as_str)
			.filter(|v| !v.trim().is_empty())
			.or(param.default_value.as_deref());

		let Some(value) = value else {
			if param.required {
				errors.push(format!("parameter '{}' is required", param.name));
			}
			continue;
		};

		match convert(param, value) {
			Ok(v) => {
				converted.insert(param.name.clone(), v);
			}
			Err(e) => errors.push(e),
		}
	}

	if errors.is_empty() {
		Ok(converted)
	} else {
		Err(ParamsError::Validation(errors))
	}
}

/// Verify a typed map: required parameters present, no undeclared names,
/// types match, enum values among the declared choices.
pub fn check_parameters(definition: &JobDefinition, parameters: &ParameterMap) -> Result<()> {
	let mut errors = Vec::new();

	for param in &definition.parameters {
		match parameters.get(&param.name) {
			None if param.required => {
				errors.push(format!("parameter '{}' is required", param.name));
			}
			None => {}
			Some(value) => {
				if let Err(e) = check_value(param, value) {
					errors.push(e);
				}
			}
		}
	}

	for name in parameters.keys() {
		if definition.parameter(name).is_none() {
			errors.push(format!(
				"parameter '{name}' is not declared by job type '{}'",
				definition.job_type
			));
		}
	}

	if errors.is_empty() {
		Ok(())
	} else {
		Err(ParamsError::Validation(errors))
	}
}

fn convert(param: &JobParameter, raw: &str) -> std::result::Result<ParameterValue, String> {
	let name = &param.name;
	let value = match param.ty {
		JobParameterType::String | JobParameterType::Multiline => {
			ParameterValue::String(raw.to_string())
		}
		JobParameterType::Integer => raw
			.trim()
			.parse()
			.map(ParameterValue::Integer)
			.map_err(|_| format!("parameter '{name}' must be an integer"))?,
		JobParameterType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
			"true" => ParameterValue::Boolean(true),
			"false" => ParameterValue::Boolean(false),
			_ => return Err(format!("parameter '{name}' must be 'true' or 'false'")),
		},
		JobParameterType::Date => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
			.map(ParameterValue::Date)
			.map_err(|_| format!("parameter '{name}' must be a date in format YYYY-MM-DD"))?,
		JobParameterType::DateTime => DATE_TIME_FORMATS
			.iter()
			.find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
			.map(ParameterValue::DateTime)
			.ok_or_else(|| {
				format!("parameter '{name}' must be a date-time in format YYYY-MM-DDTHH:mm:ss")
			})?,
		JobParameterType::Enum => ParameterValue::Enum(raw.trim().to_string()),
		JobParameterType::MultiEnum => ParameterValue::MultiEnum(
			raw
				.split(',')
				.map(str::trim)
				.filter(|s| !s.is_empty())
				.map(String::from)
				.collect(),
		),
	};
	check_value(param, &value)?;
	Ok(value)
}

fn check_value(param: &JobParameter, value: &ParameterValue) -> std::result::Result<(), String> {
	if !value.matches(param.ty) {
		return Err(format!(
			"parameter '{}' expects {} but got {}",
			param.name,
			param.ty,
			value.type_name()
		));
	}

	if param.enum_values.is_empty() {
		return Ok(());
	}

	let allowed = |v: &String| param.enum_values.iter().any(|choice| choice == v);
	match value {
		ParameterValue::Enum(v) if !allowed(v) => Err(format!(
			"parameter '{}' has unknown value '{v}'",
			param.name
		)),
		ParameterValue::MultiEnum(values) => match values.iter().find(|&v| !allowed(v)) {
			Some(v) => Err(format!(
				"parameter '{}' has unknown value '{v}'",
				param.name
			)),
			None => Ok(()),
		},
		_ => Ok(()),
	}
}
