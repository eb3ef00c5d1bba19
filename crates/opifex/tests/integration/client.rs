/*
 *  Copyright 2026 Opifex Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Integration tests for the client surface: submission, cancellation,
//! status and deliverable retrieval.

use chrono::Utc;
use opifex::client::{Client, InstanceStatus, JobRequest};
use opifex::error::DataAccessError;
use opifex::models::{JobState, NewDeliverable};
use serial_test::serial;

use crate::dal::{seed_job_def, seed_node, seed_queue};
use crate::fixtures::get_or_init_fixture;

#[tokio::test]
#[serial]
async fn test_submit_requires_a_known_enabled_definition() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();
    let client = Client::new(dal.clone());

    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;

    // Unknown application name.
    let unknown = client.submit(JobRequest::new("no-such-app")).await;
    match unknown {
        Err(DataAccessError::Invalid { field, .. }) => assert_eq!(field, "application_name"),
        other => panic!("expected a validation error, got {:?}", other),
    }

    // Disabled definition.
    dal.job_def()
        .set_enabled(job_def.id, false)
        .await
        .expect("set_enabled failed");
    let disabled = client.submit(JobRequest::new("reporting")).await;
    match disabled {
        Err(DataAccessError::Invalid { field, reason }) => {
            assert_eq!(field, "application_name");
            assert!(reason.contains("disabled"));
        }
        other => panic!("expected a validation error, got {:?}", other),
    }

    // Re-enabled, the same request goes through.
    dal.job_def()
        .set_enabled(job_def.id, true)
        .await
        .expect("set_enabled failed");
    client
        .submit(JobRequest::new("reporting"))
        .await
        .expect("submit failed");
}

#[tokio::test]
#[serial]
async fn test_submit_targets_definition_queue_unless_overridden() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();
    let client = Client::new(dal.clone());

    let queue = seed_queue(&dal, "default", true).await;
    let fast = seed_queue(&dal, "fast", false).await;
    seed_job_def(&dal, "reporting", queue.id, false).await;

    let plain_id = client
        .submit(JobRequest::new("reporting"))
        .await
        .expect("submit failed");
    let plain = dal
        .job_instance()
        .get(plain_id)
        .await
        .expect("get failed")
        .expect("instance should be live");
    assert_eq!(plain.queue_id, queue.id);

    let routed_id = client
        .submit(JobRequest::new("reporting").queue("fast"))
        .await
        .expect("submit failed");
    let routed = dal
        .job_instance()
        .get(routed_id)
        .await
        .expect("get failed")
        .expect("instance should be live");
    assert_eq!(routed.queue_id, fast.id);

    let missing = client
        .submit(JobRequest::new("reporting").queue("absent"))
        .await;
    match missing {
        Err(DataAccessError::Invalid { field, .. }) => assert_eq!(field, "queue"),
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_submit_serializes_parameters_and_tags() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();
    let client = Client::new(dal.clone());

    let queue = seed_queue(&dal, "default", true).await;
    seed_job_def(&dal, "reporting", queue.id, false).await;

    let not_before = Utc::now() + chrono::Duration::minutes(30);
    let instance_id = client
        .submit(
            JobRequest::new("reporting")
                .parameter("format", "csv")
                .priority(7)
                .not_before(not_before)
                .session_id("batch-12")
                .user_name("scheduler")
                .email("ops@example.com"),
        )
        .await
        .expect("submit failed");

    let instance = dal
        .job_instance()
        .get(instance_id)
        .await
        .expect("get failed")
        .expect("instance should be live");
    assert_eq!(instance.state, JobState::Submitted.as_str());
    assert_eq!(instance.parameters, r#"{"format":"csv"}"#);
    assert_eq!(instance.priority, 7);
    assert_eq!(instance.not_before, Some(not_before.naive_utc()));
    assert_eq!(instance.session_id.as_deref(), Some("batch-12"));
    assert_eq!(instance.user_name.as_deref(), Some("scheduler"));
    assert_eq!(instance.email.as_deref(), Some("ops@example.com"));
    assert_eq!(instance.progress, 0);
    assert!(!instance.kill_requested);
}

#[tokio::test]
#[serial]
async fn test_status_covers_live_and_finished_instances() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();
    let client = Client::new(dal.clone());

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = client
        .submit(JobRequest::new("reporting"))
        .await
        .expect("submit failed");

    let status = client.status(instance_id).await.expect("status failed");
    assert!(matches!(status, InstanceStatus::Live(_)));
    assert_eq!(status.state(), Some(JobState::Submitted));
    assert!(!status.is_finished());
    assert_eq!(status.return_code(), None);

    dal.attribution()
        .claim(instance_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");
    dal.job_instance()
        .mark_running(instance_id)
        .await
        .expect("mark_running failed");
    dal.history()
        .create_for_run(instance_id, JobState::Ended, Some(0))
        .await
        .expect("finish failed");

    let status = client.status(instance_id).await.expect("status failed");
    assert!(status.is_finished());
    assert_eq!(status.state(), Some(JobState::Ended));
    assert_eq!(status.return_code(), Some(0));

    // Ids that exist nowhere are an error.
    let missing = client.status(424242).await;
    assert!(matches!(missing, Err(DataAccessError::NotFound { .. })));
}

#[tokio::test]
#[serial]
async fn test_cancel_only_wins_before_attribution() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();
    let client = Client::new(dal.clone());

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;

    // A submitted instance cancels cleanly.
    let cancelled_id = client
        .submit(JobRequest::new("reporting"))
        .await
        .expect("submit failed");
    let history = client.cancel(cancelled_id).await.expect("cancel failed");
    assert_eq!(history.state, JobState::Cancelled.as_str());
    assert!(client
        .status(cancelled_id)
        .await
        .expect("status failed")
        .is_finished());

    let notes = client.notes(cancelled_id).await.expect("notes failed");
    assert!(notes
        .iter()
        .any(|n| n.text_message == "Status updated: CANCELLED"));

    // Cancelling the same id again conflicts: the row is already history.
    let again = client.cancel(cancelled_id).await;
    assert!(matches!(again, Err(DataAccessError::Conflict(_))));

    // A claimed instance cannot be cancelled any more.
    let claimed_id = client
        .submit(JobRequest::new("reporting"))
        .await
        .expect("submit failed");
    dal.attribution()
        .claim(claimed_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");
    let too_late = client.cancel(claimed_id).await;
    assert!(matches!(too_late, Err(DataAccessError::Conflict(_))));
}

#[tokio::test]
#[serial]
async fn test_request_kill_applies_to_running_instances_only() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();
    let client = Client::new(dal.clone());

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = client
        .submit(JobRequest::new("reporting"))
        .await
        .expect("submit failed");

    assert!(!client
        .request_kill(instance_id)
        .await
        .expect("request_kill failed"));

    dal.attribution()
        .claim(instance_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");
    assert!(!client
        .request_kill(instance_id)
        .await
        .expect("request_kill failed"));

    dal.job_instance()
        .mark_running(instance_id)
        .await
        .expect("mark_running failed");
    assert!(client
        .request_kill(instance_id)
        .await
        .expect("request_kill failed"));
}

#[tokio::test]
#[serial]
async fn test_progress_returns_none_for_unknown_ids() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();
    let client = Client::new(dal.clone());

    let queue = seed_queue(&dal, "default", true).await;
    seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = client
        .submit(JobRequest::new("reporting"))
        .await
        .expect("submit failed");

    dal.job_instance()
        .set_progress(instance_id, 42)
        .await
        .expect("set_progress failed");

    assert_eq!(
        client.progress(instance_id).await.expect("progress failed"),
        Some(42)
    );
    assert_eq!(client.progress(424242).await.expect("progress failed"), None);
}

#[tokio::test]
#[serial]
async fn test_deliverables_are_listed_and_resolved_by_random_id() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();
    let client = Client::new(dal.clone());

    let queue = seed_queue(&dal, "default", true).await;
    seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = client
        .submit(JobRequest::new("reporting"))
        .await
        .expect("submit failed");

    let now = Utc::now().naive_utc();
    let first = dal
        .deliverable()
        .register(NewDeliverable {
            job_instance_id: instance_id,
            path: "/var/opifex/deliverables/0000000001/ab12_out.csv".to_string(),
            original_name: "out.csv".to_string(),
            family: Some("exports".to_string()),
            content_hash: "0".repeat(64),
            random_id: "ab12cd34ef56".to_string(),
            created_at: now,
        })
        .await
        .expect("register failed");
    dal.deliverable()
        .register(NewDeliverable {
            job_instance_id: instance_id,
            path: "/var/opifex/deliverables/0000000001/ff00_out.log".to_string(),
            original_name: "out.log".to_string(),
            family: None,
            content_hash: "1".repeat(64),
            random_id: "ff00aa11bb22".to_string(),
            created_at: now,
        })
        .await
        .expect("register failed");

    let listed = client
        .deliverables(instance_id)
        .await
        .expect("deliverables failed");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].original_name, "out.csv");
    assert_eq!(listed[0].family.as_deref(), Some("exports"));
    assert_eq!(listed[1].original_name, "out.log");

    let path = client
        .deliverable_path(&first.random_id)
        .await
        .expect("deliverable_path failed");
    assert_eq!(
        path.to_string_lossy(),
        "/var/opifex/deliverables/0000000001/ab12_out.csv"
    );

    let missing = client.deliverable_path("nope").await;
    assert!(matches!(missing, Err(DataAccessError::NotFound { .. })));
}
