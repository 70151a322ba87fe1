// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! External parameter storage section.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParameterStorageConfigLayer {
	pub enabled: Option<bool>,
	pub cleanup_enabled: Option<bool>,
	pub retention_days: Option<u32>,
}

impl ParameterStorageConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.cleanup_enabled.is_some() {
			self.cleanup_enabled = other.cleanup_enabled;
		}
		if other.retention_days.is_some() {
			self.retention_days = other.retention_days;
		}
	}

	pub fn finalize(self) -> ParameterStorageConfig {
		let defaults = ParameterStorageConfig::default();
		ParameterStorageConfig {
			enabled: self.enabled.unwrap_or(defaults.enabled),
			cleanup_enabled: self.cleanup_enabled.unwrap_or(defaults.cleanup_enabled),
			retention_days: self.retention_days.unwrap_or(defaults.retention_days),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterStorageConfig {
	/// When false the store is a no-op and external job types fail at first use.
	pub enabled: bool,
	/// Whether the stale parameter set sweep may delete anything.
	pub cleanup_enabled: bool,
	/// Sets not accessed for this many days become sweep candidates.
	pub retention_days: u32,
}

impl Default for ParameterStorageConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			cleanup_enabled: true,
			retention_days: 30,
		}
	}
}
