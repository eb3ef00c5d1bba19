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

//! Integration tests for job instance scanning and state bookkeeping.

use chrono::{Duration, Utc};
use opifex::models::JobState;
use serial_test::serial;

use super::{new_instance, seed_job_def, seed_node, seed_queue, submit_to};
use crate::fixtures::get_or_init_fixture;

#[tokio::test]
#[serial]
async fn test_scan_orders_by_priority_then_enqueue_date() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;

    let base = Utc::now().naive_utc() - Duration::minutes(10);

    // Submitted in scrambled order on purpose.
    let mut low = new_instance(&job_def, queue.id);
    low.priority = 0;
    low.enqueue_date = base;
    let low_id = dal.job_instance().submit(low).await.expect("submit failed");

    let mut urgent_newer = new_instance(&job_def, queue.id);
    urgent_newer.priority = 5;
    urgent_newer.enqueue_date = base + Duration::minutes(2);
    let urgent_newer_id = dal
        .job_instance()
        .submit(urgent_newer)
        .await
        .expect("submit failed");

    let mut urgent_older = new_instance(&job_def, queue.id);
    urgent_older.priority = 5;
    urgent_older.enqueue_date = base + Duration::minutes(1);
    let urgent_older_id = dal
        .job_instance()
        .submit(urgent_older)
        .await
        .expect("submit failed");

    let candidates = dal
        .job_instance()
        .scan_eligible(queue.id, 10)
        .await
        .expect("scan failed");
    let ids: Vec<i64> = candidates.iter().map(|(instance, _)| instance.id).collect();

    assert_eq!(ids, vec![urgent_older_id, urgent_newer_id, low_id]);
}

#[tokio::test]
#[serial]
async fn test_scan_skips_deferred_claimed_and_foreign_queues() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let fast = seed_queue(&dal, "fast", false).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;

    // Deferred past the horizon: not eligible yet.
    let mut deferred = new_instance(&job_def, queue.id);
    deferred.not_before = Some(Utc::now().naive_utc() + Duration::hours(1));
    dal.job_instance()
        .submit(deferred)
        .await
        .expect("submit failed");

    // Deferred into the past: eligible.
    let mut matured = new_instance(&job_def, queue.id);
    matured.not_before = Some(Utc::now().naive_utc() - Duration::hours(1));
    let matured_id = dal
        .job_instance()
        .submit(matured)
        .await
        .expect("submit failed");

    // Routed to another queue: invisible to the default queue's poller.
    let elsewhere = new_instance(&job_def, fast.id);
    let elsewhere_id = dal
        .job_instance()
        .submit(elsewhere)
        .await
        .expect("submit failed");

    let candidates = dal
        .job_instance()
        .scan_eligible(queue.id, 10)
        .await
        .expect("scan failed");
    let ids: Vec<i64> = candidates.iter().map(|(instance, _)| instance.id).collect();
    assert_eq!(ids, vec![matured_id]);

    let fast_candidates = dal
        .job_instance()
        .scan_eligible(fast.id, 10)
        .await
        .expect("scan failed");
    let fast_ids: Vec<i64> = fast_candidates
        .iter()
        .map(|(instance, _)| instance.id)
        .collect();
    assert_eq!(fast_ids, vec![elsewhere_id]);

    // A claimed instance stops showing up.
    dal.attribution()
        .claim(matured_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");
    let after_claim = dal
        .job_instance()
        .scan_eligible(queue.id, 10)
        .await
        .expect("scan failed");
    assert!(after_claim.is_empty());
}

#[tokio::test]
#[serial]
async fn test_scan_honors_batch_limit() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;

    let mut submitted = Vec::new();
    for priority in 0..5 {
        submitted.push(submit_to(&dal, &job_def, queue.id, priority).await);
    }

    let candidates = dal
        .job_instance()
        .scan_eligible(queue.id, 2)
        .await
        .expect("scan failed");
    assert_eq!(candidates.len(), 2);

    // The two highest priorities, not the first two submitted.
    let ids: Vec<i64> = candidates.iter().map(|(instance, _)| instance.id).collect();
    assert_eq!(ids, vec![submitted[4], submitted[3]]);
}

#[tokio::test]
#[serial]
async fn test_mark_running_requires_attribution() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = submit_to(&dal, &job_def, queue.id, 0).await;

    // Straight from submitted: refused.
    assert!(!dal
        .job_instance()
        .mark_running(instance_id)
        .await
        .expect("mark_running failed"));

    dal.attribution()
        .claim(instance_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");
    assert!(dal
        .job_instance()
        .mark_running(instance_id)
        .await
        .expect("mark_running failed"));

    let instance = dal
        .job_instance()
        .get(instance_id)
        .await
        .expect("get failed")
        .expect("instance should be live");
    assert_eq!(instance.state, JobState::Running.as_str());
    assert!(instance.execution_date.is_some());

    // Already running: refused again, without a duplicate note.
    assert!(!dal
        .job_instance()
        .mark_running(instance_id)
        .await
        .expect("mark_running failed"));
    let notes = dal
        .message()
        .list_for_instance(instance_id)
        .await
        .expect("notes failed");
    let running_notes = notes
        .iter()
        .filter(|n| n.text_message == "Status updated: RUNNING")
        .count();
    assert_eq!(running_notes, 1);
}

#[tokio::test]
#[serial]
async fn test_kill_flag_lifecycle() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = submit_to(&dal, &job_def, queue.id, 0).await;

    // Kills only apply to running instances.
    assert!(!dal
        .job_instance()
        .request_kill(instance_id)
        .await
        .expect("request_kill failed"));
    assert!(!dal
        .job_instance()
        .kill_requested(instance_id)
        .await
        .expect("kill_requested failed"));

    dal.attribution()
        .claim(instance_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");
    assert!(!dal
        .job_instance()
        .request_kill(instance_id)
        .await
        .expect("request_kill failed"));

    dal.job_instance()
        .mark_running(instance_id)
        .await
        .expect("mark_running failed");
    assert!(dal
        .job_instance()
        .request_kill(instance_id)
        .await
        .expect("request_kill failed"));
    assert!(dal
        .job_instance()
        .kill_requested(instance_id)
        .await
        .expect("kill_requested failed"));

    let notes = dal
        .message()
        .list_for_instance(instance_id)
        .await
        .expect("notes failed");
    assert!(notes
        .iter()
        .any(|n| n.text_message == "Kill requested by operator"));

    // Once the row moves to history the flag reads false.
    dal.history()
        .create_for_run(instance_id, JobState::Killed, None)
        .await
        .expect("finish failed");
    assert!(!dal
        .job_instance()
        .kill_requested(instance_id)
        .await
        .expect("kill_requested failed"));
}

#[tokio::test]
#[serial]
async fn test_progress_is_a_plain_overwrite() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let instance_id = submit_to(&dal, &job_def, queue.id, 0).await;

    assert!(dal
        .job_instance()
        .set_progress(instance_id, 10)
        .await
        .expect("set_progress failed"));
    assert!(dal
        .job_instance()
        .set_progress(instance_id, 60)
        .await
        .expect("set_progress failed"));

    let instance = dal
        .job_instance()
        .get(instance_id)
        .await
        .expect("get failed")
        .expect("instance should be live");
    assert_eq!(instance.progress, 60);

    // Unknown ids are reported, not errored.
    assert!(!dal
        .job_instance()
        .set_progress(424242, 10)
        .await
        .expect("set_progress failed"));
}

#[tokio::test]
#[serial]
async fn test_count_active_tracks_attributed_and_running() {
    let fixture = get_or_init_fixture().await;
    let mut fixture = fixture.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    fixture.reset_database().await;
    fixture.initialize().await;
    let dal = fixture.get_dal();

    let node = seed_node(&dal).await;
    let queue = seed_queue(&dal, "default", true).await;
    let job_def = seed_job_def(&dal, "reporting", queue.id, false).await;
    let other_def = seed_job_def(&dal, "cleanup", queue.id, false).await;

    let instance_id = submit_to(&dal, &job_def, queue.id, 0).await;
    let other_id = submit_to(&dal, &other_def, queue.id, 0).await;

    assert_eq!(
        dal.job_instance()
            .count_active_for_job_def(job_def.id)
            .await
            .expect("count failed"),
        0
    );

    dal.attribution()
        .claim(instance_id, job_def.id, false, node.id)
        .await
        .expect("claim failed");
    assert_eq!(
        dal.job_instance()
            .count_active_for_job_def(job_def.id)
            .await
            .expect("count failed"),
        1
    );

    dal.job_instance()
        .mark_running(instance_id)
        .await
        .expect("mark_running failed");
    assert_eq!(
        dal.job_instance()
            .count_active_for_job_def(job_def.id)
            .await
            .expect("count failed"),
        1
    );

    // A different definition's activity does not leak into the count.
    dal.attribution()
        .claim(other_id, other_def.id, false, node.id)
        .await
        .expect("claim failed");
    assert_eq!(
        dal.job_instance()
            .count_active_for_job_def(job_def.id)
            .await
            .expect("count failed"),
        1
    );

    dal.history()
        .create_for_run(instance_id, JobState::Ended, Some(0))
        .await
        .expect("finish failed");
    assert_eq!(
        dal.job_instance()
            .count_active_for_job_def(job_def.id)
            .await
            .expect("count failed"),
        0
    );
}
