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

//! Subprocess output draining.
//!
//! A child process with piped output blocks as soon as a pipe buffer
//! fills. The pump starts one task per stream the moment the child is
//! spawned, each copying lines into the instance's log file, and offers a
//! composite [`join`](OutputPump::join) that completes only after both
//! streams hit end-of-file. The two drains share nothing, so neither can
//! stall the other.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::ExecutionError;

/// Log file name for an instance's standard output,
/// `<id zero-padded to 10 digits>.stdout.log`.
pub fn stdout_log_name(instance_id: i64) -> String {
    format!("{:010}.stdout.log", instance_id)
}

/// Log file name for an instance's standard error,
/// `<id zero-padded to 10 digits>.stderr.log`.
pub fn stderr_log_name(instance_id: i64) -> String {
    format!("{:010}.stderr.log", instance_id)
}

/// Two concurrent drains for one child process.
pub struct OutputPump {
    stdout_handle: JoinHandle<std::io::Result<u64>>,
    stderr_handle: JoinHandle<std::io::Result<u64>>,
}

impl OutputPump {
    /// Takes ownership of the child's piped stdout and stderr and starts
    /// draining them into `<log_root>/<id>.stdout.log` and `.stderr.log`.
    ///
    /// With `echo` set, every line is additionally mirrored into the
    /// engine's own log under the `opifex::job_output` target.
    pub async fn start(
        instance_id: i64,
        child: &mut Child,
        log_root: &Path,
        echo: bool,
    ) -> Result<Self, ExecutionError> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::Drain("Child stdout is not piped".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionError::Drain("Child stderr is not piped".to_string()))?;

        tokio::fs::create_dir_all(log_root)
            .await
            .map_err(|e| ExecutionError::Drain(format!("Cannot create log directory: {}", e)))?;

        let stdout_handle = tokio::spawn(drain(
            instance_id,
            "stdout",
            stdout,
            log_root.join(stdout_log_name(instance_id)),
            echo,
        ));
        let stderr_handle = tokio::spawn(drain(
            instance_id,
            "stderr",
            stderr,
            log_root.join(stderr_log_name(instance_id)),
            echo,
        ));

        Ok(Self {
            stdout_handle,
            stderr_handle,
        })
    }

    /// Waits for both drains to reach end-of-file and returns the line
    /// counts written to (stdout, stderr).
    pub async fn join(self) -> Result<(u64, u64), ExecutionError> {
        let (stdout, stderr) = tokio::join!(self.stdout_handle, self.stderr_handle);
        let stdout_lines = stdout
            .map_err(|e| ExecutionError::Drain(format!("stdout drain panicked: {}", e)))?
            .map_err(|e| ExecutionError::Drain(format!("stdout drain failed: {}", e)))?;
        let stderr_lines = stderr
            .map_err(|e| ExecutionError::Drain(format!("stderr drain panicked: {}", e)))?
            .map_err(|e| ExecutionError::Drain(format!("stderr drain failed: {}", e)))?;
        Ok((stdout_lines, stderr_lines))
    }
}

async fn drain<R>(
    instance_id: i64,
    stream: &'static str,
    reader: R,
    path: PathBuf,
    echo: bool,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let file = tokio::fs::File::create(&path).await?;
    let mut writer = BufWriter::new(file);
    let mut lines = BufReader::new(reader).lines();
    let mut count = 0u64;

    while let Some(line) = lines.next_line().await? {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        if echo {
            info!(target: "opifex::job_output", job = instance_id, stream, "{}", line);
        }
        count += 1;
    }

    writer.flush().await?;
    Ok(count)
}
