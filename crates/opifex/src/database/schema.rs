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

//! Table definitions shared by both database backends.
//!
//! Every column sticks to the SQL type subset PostgreSQL and SQLite have in
//! common (BigInt, Integer, Text, Bool, Timestamp and their Nullable forms)
//! so each query compiles once against `AnyConnection`. Backend-specific SQL
//! lives in the migrations, not here.

diesel::table! {
    /// Cluster members. One row per engine process identity.
    nodes (id) {
        id -> BigInt,
        name -> Text,
        log_root -> Text,
        deliverable_root -> Text,
        tmp_root -> Text,
        stop_requested -> Bool,
        last_seen_alive -> Nullable<Timestamp>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    /// Named work channels.
    queues (id) {
        id -> BigInt,
        name -> Text,
        description -> Text,
        is_default -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    /// Payload definitions. Referenced, never mutated, by job instances.
    job_defs (id) {
        id -> BigInt,
        application_name -> Text,
        payload_kind -> Text,
        payload_path -> Text,
        entry_point -> Text,
        manifest_path -> Nullable<Text>,
        queue_id -> BigInt,
        highlander -> Bool,
        enabled -> Bool,
        application -> Nullable<Text>,
        module -> Nullable<Text>,
        keyword1 -> Nullable<Text>,
        keyword2 -> Nullable<Text>,
        keyword3 -> Nullable<Text>,
        default_parameters -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    /// Live execution requests. Rows leave this table when they reach a
    /// terminal state; the outcome stays in `history` under the same id.
    job_instances (id) {
        id -> BigInt,
        job_def_id -> BigInt,
        queue_id -> BigInt,
        node_id -> Nullable<BigInt>,
        state -> Text,
        priority -> Integer,
        not_before -> Nullable<Timestamp>,
        enqueue_date -> Timestamp,
        attribution_date -> Nullable<Timestamp>,
        execution_date -> Nullable<Timestamp>,
        progress -> Integer,
        kill_requested -> Bool,
        parent_id -> Nullable<BigInt>,
        session_id -> Nullable<Text>,
        user_name -> Nullable<Text>,
        email -> Nullable<Text>,
        parameters -> Text,
    }
}

diesel::table! {
    /// Terminal outcomes. The primary key is the job instance id, assigned
    /// by the writer rather than the database.
    history (id) {
        id -> BigInt,
        application_name -> Text,
        queue_name -> Text,
        node_name -> Nullable<Text>,
        state -> Text,
        return_code -> Nullable<Integer>,
        priority -> Integer,
        progress -> Integer,
        enqueue_date -> Timestamp,
        attribution_date -> Nullable<Timestamp>,
        execution_date -> Nullable<Timestamp>,
        end_date -> Nullable<Timestamp>,
        highlander -> Bool,
        application -> Nullable<Text>,
        module -> Nullable<Text>,
        keyword1 -> Nullable<Text>,
        keyword2 -> Nullable<Text>,
        keyword3 -> Nullable<Text>,
        session_id -> Nullable<Text>,
        user_name -> Nullable<Text>,
        email -> Nullable<Text>,
        parent_id -> Nullable<BigInt>,
    }
}

diesel::table! {
    /// File artifacts produced by payload runs, retrieved by random id.
    deliverables (id) {
        id -> BigInt,
        job_instance_id -> BigInt,
        path -> Text,
        original_name -> Text,
        family -> Nullable<Text>,
        content_hash -> Text,
        random_id -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    /// Free-text notes attached to a job instance, append-only.
    messages (id) {
        id -> BigInt,
        job_instance_id -> BigInt,
        text_message -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    /// Queue-to-node bindings. One poller exists per row.
    deployment_parameters (id) {
        id -> BigInt,
        node_id -> BigInt,
        queue_id -> BigInt,
        polling_interval_ms -> Integer,
        max_concurrent -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::joinable!(job_instances -> job_defs (job_def_id));
diesel::joinable!(job_instances -> queues (queue_id));
diesel::joinable!(job_defs -> queues (queue_id));
diesel::joinable!(deployment_parameters -> nodes (node_id));
diesel::joinable!(deployment_parameters -> queues (queue_id));

diesel::allow_tables_to_appear_in_same_query!(
    nodes,
    queues,
    job_defs,
    job_instances,
    history,
    deliverables,
    messages,
    deployment_parameters,
);
