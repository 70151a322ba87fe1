// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use jobctl_server_config::{LogFormat, LoggingConfig};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TryInitError> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	match config.format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json())
			.try_init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
	}
}
