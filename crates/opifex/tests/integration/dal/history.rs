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

//! Integration tests for the one-way move from the live table to history.

use chrono::Utc;
use opifex::error::DataAccessError;
use opifex::models::{JobState, NewJobDef, PayloadKind};
use serial_test::serial;

use super::{new_instance, seed_job_def, seed_node, seed_queue, submit_to};
use crate::fixtures::get_or_init_fixture;

#[tokio::test]
#[serial]
async fn test_run_outcome_moves_instance_to_history() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = submit_to(&dal, &job_def, queue.id, 3).await;

    dal.attribution()
        .claim(instance_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");
    assert!(dal
        .job_instance()
        .mark_running(instance_id)
        .await
        .expect("mark_running failed"));

    let history = dal
        .history()
        .create_for_run(instance_id, JobState::Ended, Some(0))
        .await
        .expect("finish failed");

    // Same id, terminal state, snapshot of the definition and placement.
    assert_eq!(history.id, instance_id);
    assert_eq!(history.state, JobState::Ended.as_str());
    assert_eq!(history.return_code, Some(0));
    assert_eq!(history.priority, 3);
    assert_eq!(history.application_name, "reporting");
    assert_eq!(history.queue_name, "default");
    assert_eq!(history.node_name.as_deref(), Some("test-node"));
    assert!(history.attribution_date.is_some());
    assert!(history.execution_date.is_some());
    assert!(history.end_date.is_some());

    // The live row is gone.
    assert!(dal
        .job_instance()
        .get(instance_id)
        .await
        .expect("get failed")
        .is_none());

    // Notes survive the move and end with the terminal transition.
    let notes = dal
        .message()
        .list_for_instance(instance_id)
        .await
        .expect("notes failed");
    let texts: Vec<&str> = notes.iter().map(|n| n.text_message.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Status updated: ATTRIBUTED",
            "Status updated: RUNNING",
            "Status updated: ENDED",
        ]
    );
}

#[tokio::test]
#[serial]
async fn test_nonzero_return_code_is_recorded_as_crashed() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = submit_to(&dal, &job_def, queue.id, 0).await;

    dal.attribution()
        .claim(instance_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");
    dal.job_instance()
        .mark_running(instance_id)
        .await
        .expect("mark_running failed");

    let history = dal
        .history()
        .create_for_run(instance_id, JobState::Crashed, Some(3))
        .await
        .expect("finish failed");

    assert_eq!(history.state, JobState::Crashed.as_str());
    assert_eq!(history.return_code, Some(3));
    assert!(history.end_date.is_some());
}

#[tokio::test]
#[serial]
async fn test_finishing_twice_is_a_conflict() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = submit_to(&dal, &job_def, queue.id, 0).await;

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
        .expect("first finish failed");

    let second = dal
        .history()
        .create_for_run(instance_id, JobState::Ended, Some(0))
        .await;
    match second {
        Err(DataAccessError::Conflict(id)) => assert_eq!(id, instance_id),
        other => panic!("expected a conflict, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_run_outcome_requires_running_state() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = submit_to(&dal, &job_def, queue.id, 0).await;

    // Attributed but never marked running.
    dal.attribution()
        .claim(instance_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");

    let outcome = dal
        .history()
        .create_for_run(instance_id, JobState::Ended, Some(0))
        .await;
    assert!(matches!(outcome, Err(DataAccessError::Conflict(_))));

    // The rollback left the live row untouched.
    let instance = dal
        .job_instance()
        .get(instance_id)
        .await
        .expect("get failed")
        .expect("instance should still be live");
    assert_eq!(instance.state, JobState::Attributed.as_str());

    // And no history row appeared.
    assert!(dal
        .history()
        .get(instance_id)
        .await
        .expect("history get failed")
        .is_none());
}

#[tokio::test]
#[serial]
async fn test_cancellation_has_no_end_date_and_no_node() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = submit_to(&dal, &job_def, queue.id, 0).await;

    let history = dal
        .history()
        .create_for_cancellation(instance_id)
        .await
        .expect("cancellation failed");

    assert_eq!(history.id, instance_id);
    assert_eq!(history.state, JobState::Cancelled.as_str());
    assert_eq!(history.return_code, None);
    assert_eq!(history.node_name, None);
    // A job that never ran has no end date.
    assert_eq!(history.end_date, None);

    assert!(dal
        .job_instance()
        .get(instance_id)
        .await
        .expect("get failed")
        .is_none());
}

#[tokio::test]
#[serial]
async fn test_cancellation_loses_to_a_claim() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = submit_to(&dal, &job_def, queue.id, 0).await;

    dal.attribution()
        .claim(instance_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");

    let outcome = dal.history().create_for_cancellation(instance_id).await;
    assert!(matches!(outcome, Err(DataAccessError::Conflict(_))));

    // The claimed instance is still on its way to execution.
    let instance = dal
        .job_instance()
        .get(instance_id)
        .await
        .expect("get failed")
        .expect("instance should still be live");
    assert_eq!(instance.state, JobState::Attributed.as_str());
}

#[tokio::test]
#[serial]
async fn test_history_snapshot_carries_classification_and_tags() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;

    let now = Utc::now().naive_utc();
    let job_def = dal
        .job_def()
        .create(NewJobDef {
            application_name: "ledger-close".to_string(),
            payload_kind: PayloadKind::Subprocess.as_str().to_string(),
            payload_path: "/bin/true".to_string(),
            entry_point: String::new(),
            manifest_path: None,
            queue_id: queue.id,
            highlander: false,
            enabled: true,
            application: Some("accounting".to_string()),
            module: Some("close".to_string()),
            keyword1: Some("monthly".to_string()),
            keyword2: None,
            keyword3: None,
            default_parameters: "{}".to_string(),
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("create job def failed");

    let mut instance = new_instance(&job_def, queue.id);
    instance.session_id = Some("batch-77".to_string());
    instance.user_name = Some("scheduler".to_string());
    instance.email = Some("ops@example.com".to_string());
    let instance_id = dal
        .job_instance()
        .submit(instance)
        .await
        .expect("submit failed");

    dal.attribution()
        .claim(instance_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");
    dal.job_instance()
        .mark_running(instance_id)
        .await
        .expect("mark_running failed");
    let history = dal
        .history()
        .create_for_run(instance_id, JobState::Ended, Some(0))
        .await
        .expect("finish failed");

    assert_eq!(history.application.as_deref(), Some("accounting"));
    assert_eq!(history.module.as_deref(), Some("close"));
    assert_eq!(history.keyword1.as_deref(), Some("monthly"));
    assert_eq!(history.keyword2, None);
    assert_eq!(history.session_id.as_deref(), Some("batch-77"));
    assert_eq!(history.user_name.as_deref(), Some("scheduler"));
    assert_eq!(history.email.as_deref(), Some("ops@example.com"));
}
