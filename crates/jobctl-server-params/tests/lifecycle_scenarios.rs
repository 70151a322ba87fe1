// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use jobctl_params_core::validation::convert_and_validate;
use jobctl_params_core::{
	JobDefinition, JobId, JobParameter, JobParameterType, ParameterMap, ParameterSet,
	ParameterValue, Schedule,
};
use jobctl_server_params::testing::{create_test_store, InMemoryJobScheduler};
use jobctl_server_params::{
	CloneJobRequest, CreateJobRequest, ParameterLifecycle, ParameterSetLoader, ParameterStore,
	StaticJobCatalog, UpdateJobRequest,
};
use proptest::prelude::*;

fn report_definition() -> JobDefinition {
	JobDefinition::external(
		"Report",
		vec![
			JobParameter::new("title", JobParameterType::String).required(),
			JobParameter::new("rows", JobParameterType::Integer),
			JobParameter::new("dry_run", JobParameterType::Boolean),
			JobParameter::new("from", JobParameterType::Date),
			JobParameter::new("until", JobParameterType::DateTime),
			JobParameter::new("regions", JobParameterType::MultiEnum)
				.with_choices(["EU", "US", "APAC"]),
		],
	)
}

struct Harness {
	scheduler: Arc<InMemoryJobScheduler>,
	lifecycle: ParameterLifecycle,
	loader: ParameterSetLoader,
}

async fn harness() -> Harness {
	let scheduler = Arc::new(InMemoryJobScheduler::new());
	let store: Arc<dyn ParameterStore> = Arc::new(create_test_store().await);
	let catalog = Arc::new(StaticJobCatalog::new([report_definition()]));
	Harness {
		lifecycle: ParameterLifecycle::new(scheduler.clone(), store.clone(), catalog.clone()),
		loader: ParameterSetLoader::new(scheduler.clone(), store, catalog),
		scheduler,
	}
}

fn params(pairs: &[(&str, ParameterValue)]) -> ParameterMap {
	pairs
		.iter()
		.map(|(k, v)| (k.to_string(), v.clone()))
		.collect()
}

#[tokio::test]
async fn report_create_update_clone_delete() {
	let h = harness().await;

	let j1 = h
		.lifecycle
		.create_with_parameters(CreateJobRequest {
			job_type: "Report".to_string(),
			name: "quarterly".to_string(),
			parameters: params(&[
				("title", ParameterValue::from("Q1")),
				("rows", ParameterValue::Integer(500)),
			]),
			schedule: Schedule::ExternalTrigger,
		})
		.await
		.unwrap()
		.job_id;
	assert_eq!(
		h.loader.load_parameters(j1).await.unwrap(),
		params(&[
			("title", ParameterValue::from("Q1")),
			("rows", ParameterValue::Integer(500)),
		])
	);

	h.lifecycle
		.update_with_parameters(UpdateJobRequest {
			job_id: j1,
			name: None,
			schedule: None,
			parameters: params(&[("title", ParameterValue::from("Q1-rev"))]),
		})
		.await
		.unwrap();
	assert_eq!(
		h.loader.load_parameters(j1).await.unwrap(),
		params(&[("title", ParameterValue::from("Q1-rev"))])
	);

	let j2 = h
		.lifecycle
		.clone_with_overrides(CloneJobRequest {
			source_job_id: j1,
			name_postfix: None,
			schedule: None,
			overrides: ParameterMap::new(),
		})
		.await
		.unwrap()
		.job_id;
	assert_ne!(j1, j2);
	assert_eq!(
		h.loader.load_parameters(j2).await.unwrap(),
		params(&[("title", ParameterValue::from("Q1-rev"))])
	);

	h.lifecycle.delete_and_cleanup(j1).await.unwrap();

	let err = h.loader.load_parameters(j1).await.unwrap_err();
	assert!(err.is_job_missing());
	assert_eq!(
		h.loader.load_parameters(j2).await.unwrap(),
		params(&[("title", ParameterValue::from("Q1-rev"))])
	);
	assert_eq!(h.scheduler.job_count().await, 1);
}

#[tokio::test]
async fn updating_a_clone_leaves_the_source_alone() {
	let h = harness().await;

	let a = h
		.lifecycle
		.create_with_parameters(CreateJobRequest {
			job_type: "Report".to_string(),
			name: "source".to_string(),
			parameters: params(&[("title", ParameterValue::from("x1"))]),
			schedule: Schedule::ExternalTrigger,
		})
		.await
		.unwrap()
		.job_id;
	let b = h
		.lifecycle
		.clone_with_overrides(CloneJobRequest {
			source_job_id: a,
			name_postfix: Some("copy".to_string()),
			schedule: None,
			overrides: ParameterMap::new(),
		})
		.await
		.unwrap()
		.job_id;
	let updates_before = h.scheduler.updates().await.len();

	h.lifecycle
		.update_with_parameters(UpdateJobRequest {
			job_id: b,
			name: None,
			schedule: None,
			parameters: params(&[("title", ParameterValue::from("changed"))]),
		})
		.await
		.unwrap();

	assert_eq!(
		h.loader.load_parameters(a).await.unwrap(),
		params(&[("title", ParameterValue::from("x1"))])
	);
	assert_eq!(
		h.loader.load_parameters(b).await.unwrap(),
		params(&[("title", ParameterValue::from("changed"))])
	);

	let updates = h.scheduler.updates().await;
	assert!(updates.len() > updates_before);
	assert!(updates[updates_before..].iter().all(|(id, _)| *id == b));
}

#[tokio::test]
async fn externally_triggered_jobs_never_come_due() {
	let h = harness().await;
	let parked = h
		.lifecycle
		.create_with_parameters(CreateJobRequest {
			job_type: "Report".to_string(),
			name: "parked".to_string(),
			parameters: params(&[("title", ParameterValue::from("p"))]),
			schedule: Schedule::ExternalTrigger,
		})
		.await
		.unwrap()
		.job_id;
	let timed = h
		.lifecycle
		.create_with_parameters(CreateJobRequest {
			job_type: "Report".to_string(),
			name: "timed".to_string(),
			parameters: params(&[("title", ParameterValue::from("t"))]),
			schedule: Schedule::At {
				at: Utc::now() - Duration::hours(1),
			},
		})
		.await
		.unwrap()
		.job_id;

	let due = h.scheduler.due_jobs(Utc::now()).await;
	assert_eq!(due, vec![timed]);
	assert!(!due.contains(&parked));
}

#[tokio::test]
async fn form_input_survives_storage_without_type_drift() {
	let h = harness().await;
	let raw: HashMap<String, String> = [
		("title", "\"quoted\" title"),
		("rows", "42"),
		("dry_run", "false"),
		("from", "2025-01-31"),
		("until", "2025-02-01T17:45:00"),
		("regions", "EU,APAC"),
	]
	.into_iter()
	.map(|(k, v)| (k.to_string(), v.to_string()))
	.collect();
	let parameters = convert_and_validate(&report_definition(), &raw).unwrap();

	let job_id = h
		.lifecycle
		.create_with_parameters(CreateJobRequest {
			job_type: "Report".to_string(),
			name: "typed".to_string(),
			parameters: parameters.clone(),
			schedule: Schedule::ExternalTrigger,
		})
		.await
		.unwrap()
		.job_id;

	let loaded = h.loader.load_parameter_set(job_id).await.unwrap();
	assert_eq!(loaded.parameters, parameters);
	assert_eq!(loaded.get_string("title").as_deref(), Some("\"quoted\" title"));
	assert_eq!(loaded.get_integer("rows"), Some(42));
	assert_eq!(loaded.get_boolean("dry_run"), Some(false));
	assert_eq!(loaded.get_date("from"), NaiveDate::from_ymd_opt(2025, 1, 31));
	assert_eq!(
		loaded.get_date_time("until"),
		NaiveDateTime::parse_from_str("2025-02-01T17:45:00", "%Y-%m-%dT%H:%M:%S").ok()
	);
	assert_eq!(loaded.get_string_list("regions"), vec!["EU", "APAC"]);
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(32))]

	#[test]
	fn arbitrary_strings_round_trip_through_the_store(title in ".*", rows in any::<i64>()) {
		let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
		rt.block_on(async {
			let store = create_test_store().await;
			let parameters = params(&[
				("title", ParameterValue::String(title.clone())),
				("rows", ParameterValue::Integer(rows)),
			]);
			let set = ParameterSet::create(JobId::new(), "Report", parameters.clone()).unwrap();
			store.store(&set).await.unwrap();

			let loaded = store.find_by_id(set.id).await.unwrap().unwrap();
			assert_eq!(loaded.parameters, parameters);
		});
	}
}
