// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::error::Result;

/// Create a pool for any supported backend (`sqlite:`, `postgres://`, `mysql://`).
///
/// SQLite database files are created when missing.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<AnyPool> {
	sqlx::any::install_default_drivers();

	let url = with_create_mode(database_url);
	let pool = AnyPoolOptions::new()
		.max_connections(max_connections)
		.connect(&url)
		.await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

fn with_create_mode(url: &str) -> String {
	if !url.starts_with("sqlite:") || url.contains(":memory:") || url.contains("mode=") {
		return url.to_string();
	}
	let separator = if url.contains('?') { '&' } else { '?' };
	format!("{url}{separator}mode=rwc")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sqlite_files_get_create_mode() {
		assert_eq!(with_create_mode("sqlite:./jobctl.db"), "sqlite:./jobctl.db?mode=rwc");
		assert_eq!(
			with_create_mode("sqlite:./jobctl.db?cache=shared"),
			"sqlite:./jobctl.db?cache=shared&mode=rwc"
		);
	}

	#[test]
	fn other_urls_are_untouched() {
		assert_eq!(with_create_mode("sqlite::memory:"), "sqlite::memory:");
		assert_eq!(with_create_mode("sqlite:x.db?mode=ro"), "sqlite:x.db?mode=ro");
		assert_eq!(
			with_create_mode("postgres://localhost/jobctl"),
			"postgres://localhost/jobctl"
		);
	}

	#[tokio::test]
	async fn creates_missing_sqlite_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("params.db");
		let url = format!("sqlite:{}", path.display());

		let pool = create_pool(&url, 1).await.unwrap();
		pool.close().await;
		assert!(path.exists());
	}
}
