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

//! Row models for every table plus the job instance state machine.

pub mod deliverable;
pub mod deployment_parameter;
pub mod history;
pub mod job_def;
pub mod job_instance;
pub mod message;
pub mod node;
pub mod queue;
pub mod state;

pub use deliverable::{Deliverable, NewDeliverable};
pub use deployment_parameter::{DeploymentParameter, NewDeploymentParameter};
pub use history::{History, NewHistory};
pub use job_def::{JobDef, NewJobDef, PayloadKind};
pub use job_instance::{JobInstance, NewJobInstance};
pub use message::{Message, NewMessage};
pub use node::{NewNode, Node};
pub use queue::{NewQueue, Queue};
pub use state::JobState;
