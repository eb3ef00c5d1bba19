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

//! # Job Execution
//!
//! This module turns claimed job instances into finished ones. Each queue
//! bound to the node gets a [`Poller`] that scans for eligible work, claims
//! it against the whole cluster and hands it to a [`Loader`] task, which
//! owns that one instance through to its terminal state.
//!
//! ## Key Components
//!
//! - [`Poller`]: per-queue scan/claim/dispatch loop with admission control.
//! - [`Loader`]: executes exactly one instance, performs all of its state
//!   transitions and absorbs every per-instance failure.
//! - [`ContextCache`]: shares built execution contexts between loaders,
//!   resolving each application identity at most once.
//! - [`OutputPump`]: drains a child process's stdout and stderr into
//!   per-job log files so the child never blocks on a full pipe.
//!
//! Failures inside a loader never propagate: they become a `crashed`
//! terminal state plus a note on the instance. The only way a poller stops
//! is a shutdown signal.

pub mod context;
pub mod loader;
pub mod output_pump;
pub mod payload;
pub mod poller;
pub mod types;

pub use context::{ContextCache, ExecutionContext};
pub use loader::Loader;
pub use output_pump::OutputPump;
pub use poller::Poller;
pub use types::{ClaimedInstance, DeliverableDescriptor, ExecutionSlot, PayloadReport, PayloadRequest};
