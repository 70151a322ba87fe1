// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod database;
mod logging;
mod parameter_storage;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use parameter_storage::{ParameterStorageConfig, ParameterStorageConfigLayer};
