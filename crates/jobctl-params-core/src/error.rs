// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for parameter handling.

use thiserror::Error;

use crate::JobId;

/// Result type for parameter operations.
pub type Result<T> = std::result::Result<T, ParamsError>;

/// Errors that can occur while building, validating or decoding parameters.
#[derive(Debug, Error)]
pub enum ParamsError {
	#[error("job type not found: {0}")]
	JobTypeNotFound(String),

	#[error("parameter set not found for job {0}")]
	ParameterSetNotFound(JobId),

	#[error("validation failed: {}", .0.join("; "))]
	Validation(Vec<String>),

	#[error("invalid parameter set: {0}")]
	InvalidParameterSet(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}
