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

//! Job instance state machine.
//!
//! States are stored as lowercase text in the database. Transitions are
//! one-directional and terminal states are never left:
//!
//! ```text
//! submitted -> attributed -> running -> ended | crashed | killed
//! submitted -> cancelled
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle state of a job instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Created by the submission interface, waiting to be claimed
    Submitted,
    /// Claimed by exactly one node, not yet executing
    Attributed,
    /// Entry point invoked
    Running,
    /// Payload returned normally
    Ended,
    /// Failed during resolution, context construction or invocation
    Crashed,
    /// Withdrawn before any node claimed it
    Cancelled,
    /// Terminated by an operator while running
    Killed,
}

impl JobState {
    /// The database representation of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Attributed => "attributed",
            JobState::Running => "running",
            JobState::Ended => "ended",
            JobState::Crashed => "crashed",
            JobState::Cancelled => "cancelled",
            JobState::Killed => "killed",
        }
    }

    /// Parses a database value back into a state.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "submitted" => Some(JobState::Submitted),
            "attributed" => Some(JobState::Attributed),
            "running" => Some(JobState::Running),
            "ended" => Some(JobState::Ended),
            "crashed" => Some(JobState::Crashed),
            "cancelled" => Some(JobState::Cancelled),
            "killed" => Some(JobState::Killed),
            _ => None,
        }
    }

    /// True for states no instance ever leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Ended | JobState::Crashed | JobState::Cancelled | JobState::Killed
        )
    }

    /// True if the instance counts against a Highlander job definition,
    /// i.e. it is claimed or executing somewhere in the cluster.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Attributed | JobState::Running)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Submitted, JobState::Attributed)
                | (JobState::Submitted, JobState::Cancelled)
                | (JobState::Attributed, JobState::Running)
                | (JobState::Running, JobState::Ended)
                | (JobState::Running, JobState::Crashed)
                | (JobState::Running, JobState::Killed)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
