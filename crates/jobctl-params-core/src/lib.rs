// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for externally stored job parameters.
//!
//! A job whose type declares [`ParameterStorageStrategy::External`] keeps its
//! parameters in a [`ParameterSet`] whose id is the job's own [`JobId`]. This
//! crate holds the data model shared by the store, the lifecycle orchestrator
//! and the loader; it has no I/O.

pub mod definition;
pub mod error;
pub mod job;
pub mod parameter;
pub mod parameter_set;
pub mod validation;

pub use definition::{JobDefinition, JobParameter, JobParameterType, ParameterStorageStrategy};
pub use error::{ParamsError, Result};
pub use job::{clone_job_name, JobId, JobPayload, LinkState, Schedule, ScheduledJob};
pub use parameter::{ParameterMap, ParameterValue};
pub use parameter_set::ParameterSet;
