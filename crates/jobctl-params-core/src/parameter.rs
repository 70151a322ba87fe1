// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Parameter values.
//!
//! Values are serialized with an explicit type tag so that a date stays a date
//! and an enum stays an enum after a trip through a JSON column:
//!
//! ```json
//! {"from": {"type": "date", "value": "2025-01-31"}, "rows": {"type": "integer", "value": 500}}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::JobParameterType;

/// Parameter name to value. Ordering carries no meaning; a `BTreeMap` keeps the
/// serialized form stable.
pub type ParameterMap = BTreeMap<String, ParameterValue>;

/// A single typed parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
	String(String),
	Integer(i64),
	Boolean(bool),
	Date(NaiveDate),
	DateTime(NaiveDateTime),
	Enum(String),
	MultiEnum(Vec<String>),
}

impl ParameterValue {
	/// Whether this value is acceptable for a parameter declared as `ty`.
	pub fn matches(&self, ty: JobParameterType) -> bool {
		matches!(
			(self, ty),
			(Self::String(_), JobParameterType::String | JobParameterType::Multiline)
				| (Self::Integer(_), JobParameterType::Integer)
				| (Self::Boolean(_), JobParameterType::Boolean)
				| (Self::Date(_), JobParameterType::Date)
				| (Self::DateTime(_), JobParameterType::DateTime)
				| (Self::Enum(_), JobParameterType::Enum)
				| (Self::MultiEnum(_), JobParameterType::MultiEnum)
		)
	}

	pub fn type_name(&self) -> &'static str {
		match self {
			Self::String(_) => "string",
			Self::Integer(_) => "integer",
			Self::Boolean(_) => "boolean",
			Self::Date(_) => "date",
			Self::DateTime(_) => "date_time",
			Self::Enum(_) => "enum",
			Self::MultiEnum(_) => "multi_enum",
		}
	}
}

impl fmt::Display for ParameterValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::String(s) | Self::Enum(s) => write!(f, "{s}"),
			Self::Integer(i) => write!(f, "{i}"),
			Self::Boolean(b) => write!(f, "{b}"),
			Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
			Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
			Self::MultiEnum(values) => write!(f, "{}", values.join(",")),
		}
	}
}

impl From<&str> for ParameterValue {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for ParameterValue {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<i64> for ParameterValue {
	fn from(value: i64) -> Self {
		Self::Integer(value)
	}
}

impl From<bool> for ParameterValue {
	fn from(value: bool) -> Self {
		Self::Boolean(value)
	}
}

impl From<NaiveDate> for ParameterValue {
	fn from(value: NaiveDate) -> Self {
		Self::Date(value)
	}
}

impl From<NaiveDateTime> for ParameterValue {
	fn from(value: NaiveDateTime) -> Self {
		Self::DateTime(value)
	}
}
