// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use jobctl_params_core::{JobId, ParamsError};

#[derive(Debug, thiserror::Error)]
pub enum ParamsServerError {
	#[error("Database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error(transparent)]
	Params(#[from] ParamsError),

	#[error("Job not found: {0}")]
	JobNotFound(JobId),

	#[error("External parameter storage is not available for job type {job_type}")]
	StorageUnavailable { job_type: String },

	#[error("Scheduler error: {0}")]
	Scheduler(String),

	#[error("Job {job_id} created but parameters not attached: {reason}")]
	ParametersNotAttached { job_id: JobId, reason: String },

	#[error("Invalid link transition: {0}")]
	InvalidTransition(String),
}

impl ParamsServerError {
	/// True when the job exists but its parameter set does not.
	pub fn is_parameter_set_missing(&self) -> bool {
		matches!(self, Self::Params(ParamsError::ParameterSetNotFound(_)))
	}

	pub fn is_job_missing(&self) -> bool {
		matches!(self, Self::JobNotFound(_))
	}

	/// Message safe to show to callers outside the process. Carries nothing
	/// beyond the job id and the caller's own validation input.
	pub fn public_message(&self) -> String {
		match self {
			Self::JobNotFound(id) => format!("Job {id} not found"),
			Self::Params(ParamsError::ParameterSetNotFound(id)) => {
				format!("Parameters for job {id} not found")
			}
			Self::Params(ParamsError::Validation(_) | ParamsError::JobTypeNotFound(_)) => {
				self.to_string()
			}
			Self::Params(_) => "Stored parameters could not be read".to_string(),
			Self::ParametersNotAttached { job_id, .. } => {
				format!("Job {job_id} was created but its parameters could not be attached")
			}
			Self::StorageUnavailable { .. } => "Parameter storage is not available".to_string(),
			Self::Database(_) | Self::Scheduler(_) | Self::InvalidTransition(_) => {
				"Internal error".to_string()
			}
		}
	}
}

pub type Result<T> = std::result::Result<T, ParamsServerError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn public_message_hides_database_details() {
		let err = ParamsServerError::Database(sqlx::Error::Protocol(
			"password authentication failed for user jobctl".to_string(),
		));
		assert_eq!(err.public_message(), "Internal error");
	}

	#[test]
	fn public_message_hides_attach_reason() {
		let job_id = JobId::new();
		let err = ParamsServerError::ParametersNotAttached {
			job_id,
			reason: "disk full on db-01".to_string(),
		};
		let msg = err.public_message();
		assert!(msg.contains(&job_id.to_string()));
		assert!(!msg.contains("db-01"));
	}

	#[test]
	fn missing_job_and_missing_set_are_distinct() {
		let id = JobId::new();
		let job = ParamsServerError::JobNotFound(id);
		let set = ParamsServerError::from(ParamsError::ParameterSetNotFound(id));
		assert!(job.is_job_missing() && !job.is_parameter_set_missing());
		assert!(set.is_parameter_set_missing() && !set.is_job_missing());
	}
}
