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

//! Payload invocation.
//!
//! Library payloads export one C-ABI entry point:
//!
//! ```c
//! int32_t opifex_run(
//!     const uint8_t *request_json, uint32_t request_len,
//!     uint8_t *response_buffer, uint32_t response_capacity,
//!     uint32_t *response_len);
//! ```
//!
//! The request is the serialized [`PayloadRequest`]; the response buffer
//! carries a serialized [`PayloadReport`] on a completed run, or a bare
//! error message when the payload's scaffolding failed. Subprocess
//! payloads receive the same information through arguments and
//! environment variables, and report produced files by appending one JSON
//! object per line to the file named in `OPIFEX_REPORT_FILE`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use libloading::{Library, Symbol};
use tokio::process::Command;
use tracing::warn;

use super::types::{DeliverableDescriptor, PayloadReport, PayloadRequest};
use crate::error::ExecutionError;
use crate::models::JobDef;

/// Entry point symbol used when a definition does not name one.
pub const DEFAULT_ENTRY_POINT: &str = "opifex_run";

/// Capacity of the response buffer handed to library payloads.
pub const RESPONSE_BUFFER_SIZE: usize = 64 * 1024;

/// File name of the subprocess report file inside the scratch directory.
pub const REPORT_FILE_NAME: &str = "report.jsonl";

/// File name of the subprocess progress file inside the scratch directory.
pub const PROGRESS_FILE_NAME: &str = "progress.txt";

/// Environment variable carrying the instance id to subprocess payloads.
pub const ENV_INSTANCE_ID: &str = "OPIFEX_JOB_INSTANCE_ID";
/// Environment variable carrying the application name.
pub const ENV_APPLICATION: &str = "OPIFEX_APPLICATION";
/// Environment variable naming the deliverable report file.
pub const ENV_REPORT_FILE: &str = "OPIFEX_REPORT_FILE";
/// Environment variable naming the progress file.
pub const ENV_PROGRESS_FILE: &str = "OPIFEX_PROGRESS_FILE";
/// Environment variable naming the per-run scratch directory.
pub const ENV_TMP_DIR: &str = "OPIFEX_TMP_DIR";
/// Environment variable carrying resolved artifact paths, PATH-style.
pub const ENV_ARTIFACTS: &str = "OPIFEX_ARTIFACTS";

const ENV_PARAM_PREFIX: &str = "OPIFEX_PARAM_";

type EntryPointFn = unsafe extern "C" fn(
    request_json: *const u8,
    request_len: u32,
    response_buffer: *mut u8,
    response_capacity: u32,
    response_len: *mut u32,
) -> i32;

/// Calls a library payload's entry point and decodes its response.
///
/// Returns the entry point's return code together with the parsed report.
/// A non-JSON response on a nonzero return code is treated as the
/// payload's error message; a non-JSON response on a zero return code is a
/// broken report contract. This call blocks for the full duration of the
/// payload, so run it on a blocking thread.
pub fn invoke_library(
    library: &Library,
    entry_point: &str,
    request: &PayloadRequest,
) -> Result<(i32, PayloadReport), ExecutionError> {
    let symbol_name = if entry_point.is_empty() {
        DEFAULT_ENTRY_POINT
    } else {
        entry_point
    };

    let run: Symbol<EntryPointFn> = unsafe {
        library
            .get(symbol_name.as_bytes())
            .map_err(|e| ExecutionError::EntryPoint {
                symbol: symbol_name.to_string(),
                reason: e.to_string(),
            })?
    };

    let request_json = serde_json::to_string(request).map_err(|e| {
        ExecutionError::Invocation(format!("Failed to serialize payload request: {}", e))
    })?;
    let request_bytes = request_json.as_bytes();

    let mut response_buffer = vec![0u8; RESPONSE_BUFFER_SIZE];
    let mut response_len = 0u32;

    let return_code = unsafe {
        run(
            request_bytes.as_ptr(),
            request_bytes.len() as u32,
            response_buffer.as_mut_ptr(),
            response_buffer.len() as u32,
            &mut response_len,
        )
    };

    response_buffer.truncate((response_len as usize).min(RESPONSE_BUFFER_SIZE));
    if response_buffer.is_empty() {
        return Ok((return_code, PayloadReport::default()));
    }

    match serde_json::from_slice::<PayloadReport>(&response_buffer) {
        Ok(report) => Ok((return_code, report)),
        Err(_) if return_code != 0 => Err(ExecutionError::Invocation(
            String::from_utf8_lossy(&response_buffer).to_string(),
        )),
        Err(e) => Err(ExecutionError::Report(format!(
            "Response is not a valid report: {}",
            e
        ))),
    }
}

/// Builds the child process command for a subprocess payload.
///
/// Parameter values become arguments in key order; the full map is also
/// exported as `OPIFEX_PARAM_<KEY>` environment variables. The child runs
/// inside the scratch directory and is killed if its handle is dropped.
pub fn build_command(
    job_def: &JobDef,
    request: &PayloadRequest,
    scratch_dir: &Path,
    artifacts: &[PathBuf],
) -> Command {
    let mut command = Command::new(&job_def.payload_path);
    command
        .args(request.parameters.values())
        .current_dir(scratch_dir)
        .env(ENV_INSTANCE_ID, request.job_instance_id.to_string())
        .env(ENV_APPLICATION, &request.application_name)
        .env(ENV_REPORT_FILE, report_file_path(scratch_dir))
        .env(ENV_PROGRESS_FILE, progress_file_path(scratch_dir))
        .env(ENV_TMP_DIR, scratch_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Ok(joined) = std::env::join_paths(artifacts) {
        command.env(ENV_ARTIFACTS, joined);
    }
    for (key, value) in &request.parameters {
        command.env(env_key(key), value);
    }

    command
}

/// Where the subprocess report file lives for a given scratch directory.
pub fn report_file_path(scratch_dir: &Path) -> PathBuf {
    scratch_dir.join(REPORT_FILE_NAME)
}

/// Where the subprocess progress file lives for a given scratch directory.
pub fn progress_file_path(scratch_dir: &Path) -> PathBuf {
    scratch_dir.join(PROGRESS_FILE_NAME)
}

/// Reads the payload's self-reported progress, if it wrote any.
///
/// The payload overwrites the file with a bare integer whenever it likes.
/// Reads race those writes on purpose; an unreadable or half-written value
/// is simply ignored until the next poll.
pub async fn read_progress_file(path: &Path) -> Option<i32> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    raw.trim().parse::<i32>().ok()
}

/// Reads deliverable descriptors from a subprocess report file.
///
/// A missing file means the payload produced nothing. Malformed lines are
/// warned and skipped individually; they never fail the run.
pub async fn read_report_file(path: &Path) -> Vec<DeliverableDescriptor> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read payload report file");
            return Vec::new();
        }
    };

    let mut descriptors = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<DeliverableDescriptor>(line) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => warn!(
                path = %path.display(),
                line = index + 1,
                error = %e,
                "Skipping malformed deliverable descriptor"
            ),
        }
    }
    descriptors
}

fn env_key(parameter_name: &str) -> String {
    let mut key = String::with_capacity(ENV_PARAM_PREFIX.len() + parameter_name.len());
    key.push_str(ENV_PARAM_PREFIX);
    for c in parameter_name.chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c.to_ascii_uppercase());
        } else {
            key.push('_');
        }
    }
    key
}
