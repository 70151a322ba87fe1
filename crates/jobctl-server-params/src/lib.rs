// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server side of external job parameter storage.
//!
//! - [`store`]: the `job_parameter_sets` table behind the [`ParameterStore`] trait
//! - [`normalizer`]: per-backend JSON column handling, probed once per pool
//! - [`lifecycle`]: create/update/clone/delete protocols that keep a job and its
//!   parameter set under the same id
//! - [`loader`]: resolves a job's parameters at execution time
//! - [`sweep`]: removes stale parameter sets whose job is gone

pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod normalizer;
pub mod pool;
pub mod ports;
pub mod runtime;
pub mod store;
pub mod sweep;
pub mod telemetry;
pub mod testing;

pub use error::{ParamsServerError, Result};
pub use lifecycle::{
	CloneJobRequest, CreateJobRequest, JobOutcome, ParameterLifecycle, UpdateJobRequest,
};
pub use loader::ParameterSetLoader;
pub use normalizer::{detect_normalizer, Dialect, JsonNormalizer};
pub use pool::create_pool;
pub use ports::{JobCatalog, JobChanges, JobScheduler, StaticJobCatalog};
pub use runtime::ParamsRuntime;
pub use store::{DisabledParameterStore, ParameterStore, SqlParameterStore};
pub use sweep::{ParameterSetSweeper, SweepReport};
pub use telemetry::init_tracing;
