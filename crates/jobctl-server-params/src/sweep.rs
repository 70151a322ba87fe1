// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::instrument;

use crate::error::Result;
use crate::ports::JobScheduler;
use crate::store::ParameterStore;

/// Oldest last-access time a set may have and still be kept. Saturates at the
/// earliest representable instant, so a huge retention keeps everything.
fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
	Duration::try_days(i64::from(retention_days))
		.and_then(|window| now.checked_sub_signed(window))
		.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
	/// Sets past the retention window.
	pub examined: usize,
	/// Stale sets whose job no longer exists, now removed.
	pub deleted: usize,
	/// Stale sets whose job still exists.
	pub kept: usize,
}

/// Removes parameter sets that have not been read within the retention window
/// and whose job is gone. Sets of live jobs are never touched, however old.
///
/// Runs on demand; hosts decide how often to call [`ParameterSetSweeper::sweep`].
pub struct ParameterSetSweeper {
	store: Arc<dyn ParameterStore>,
	scheduler: Arc<dyn JobScheduler>,
	cleanup_enabled: bool,
	retention_days: u32,
}

impl ParameterSetSweeper {
	pub fn new(
		store: Arc<dyn ParameterStore>,
		scheduler: Arc<dyn JobScheduler>,
		cleanup_enabled: bool,
		retention_days: u32,
	) -> Self {
		Self {
			store,
			scheduler,
			cleanup_enabled,
			retention_days,
		}
	}

	pub async fn sweep(&self) -> Result<SweepReport> {
		self.sweep_at(Utc::now()).await
	}

	#[instrument(skip(self), fields(retention_days = self.retention_days))]
	pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
		if !self.cleanup_enabled || !self.store.is_external_storage_enabled() {
			tracing::debug!("parameter set cleanup disabled");
			return Ok(SweepReport::default());
		}

		let cutoff = retention_cutoff(now, self.retention_days);
		let stale = self.store.list_stale(cutoff).await?;

		let mut report = SweepReport {
			examined: stale.len(),
			..Default::default()
		};
		for id in stale {
			if self.scheduler.get(id).await?.is_some() {
				report.kept += 1;
				continue;
			}
			self.store.delete_by_id(id).await?;
			report.deleted += 1;
		}

		tracing::info!(
			examined = report.examined,
			deleted = report.deleted,
			kept = report.kept,
			"Parameter set cleanup completed"
		);
		Ok(report)
	}
}
