// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by each source and merged in precedence order.

use serde::Deserialize;

use crate::sections::{DatabaseConfigLayer, LoggingConfigLayer, ParameterStorageConfigLayer};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub parameter_storage: Option<ParameterStorageConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(current), Some(other)) => merge(current, other),
		(None, Some(other)) => *base = Some(other),
		(_, None) => {}
	}
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(
			&mut self.parameter_storage,
			other.parameter_storage,
			ParameterStorageConfigLayer::merge,
		);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}
