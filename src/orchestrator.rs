// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Eligibility gate, resource acquisition, worker lifecycle, fallback, and
//! result assembly — the one place that ties C1–C5 together.

use crate::classifier::classify;
use crate::config::WorkerRunnerConfig;
use crate::driver::{drive_exchange, ParsedOutcome};
use crate::error::WorkerRunnerError;
use crate::fallback::SpawnRunner;
use crate::key::WorkerKey;
use crate::pool::{Worker, WorkerPool};
use crate::proto::WorkResponse;
use crate::recording::RecordingReader;
use crate::request::build_work_request;
use crate::resource::{ResourceHandle, ResourceManager};
use crate::spawn::{ExecutionPolicy, ProgressStatus, Spawn, SpawnResult, SpawnStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info_span, warn, Instrument};

const SUPPORTS_WORKERS_KEY: &str = "supports-workers";
const SUPPORTS_WORKERS_VALUE: &str = "1";

/// Guards a borrowed worker for the span between `borrow` and whichever of
/// `return_worker`/`invalidate` the orchestrator reaches. If the future
/// driving the exchange is dropped before either is reached — a caller
/// cancelling via a timeout or `tokio::select!` after the borrow succeeded
/// — the worker's stream state is indeterminate and it must never be
/// returned for reuse. `Drop` defaults to invalidating it; the two
/// explicit teardown paths disarm the guard first.
struct BorrowedWorker {
    worker: Option<Box<dyn Worker>>,
    key: WorkerKey,
    pool: Arc<dyn WorkerPool>,
}

impl BorrowedWorker {
    fn new(worker: Box<dyn Worker>, key: WorkerKey, pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            worker: Some(worker),
            key,
            pool,
        }
    }

    fn as_mut(&mut self) -> &mut dyn Worker {
        self.worker
            .as_mut()
            .expect("worker is only taken during teardown")
            .as_mut()
    }

    async fn return_to_pool(mut self) {
        let worker = self.worker.take().expect("worker is only taken once");
        self.pool.return_worker(&self.key, worker).await;
    }

    async fn invalidate(mut self) {
        let worker = self.worker.take().expect("worker is only taken once");
        self.pool.invalidate(&self.key, worker).await;
    }
}

impl Drop for BorrowedWorker {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let pool = self.pool.clone();
            let key = self.key.clone();
            tokio::spawn(async move {
                pool.invalidate(&key, worker).await;
            });
        }
    }
}

/// The worker spawn strategy: multiplexes eligible actions over pooled
/// persistent worker processes, falling back to a conventional runner for
/// everything else.
pub struct WorkerSpawnRunner {
    pool: Arc<dyn WorkerPool>,
    resources: Arc<dyn ResourceManager>,
    fallback: Arc<dyn SpawnRunner>,
    config: WorkerRunnerConfig,
}

impl WorkerSpawnRunner {
    pub fn new(
        pool: Arc<dyn WorkerPool>,
        resources: Arc<dyn ResourceManager>,
        fallback: Arc<dyn SpawnRunner>,
        config: WorkerRunnerConfig,
    ) -> Self {
        Self {
            pool,
            resources,
            fallback,
            config,
        }
    }

    pub async fn exec(
        &self,
        spawn: &dyn Spawn,
        policy: &dyn ExecutionPolicy,
    ) -> Result<SpawnResult, WorkerRunnerError> {
        let span = info_span!("worker_exec", mnemonic = spawn.mnemonic());
        self.exec_inner(spawn, policy).instrument(span).await
    }

    async fn exec_inner(
        &self,
        spawn: &dyn Spawn,
        policy: &dyn ExecutionPolicy,
    ) -> Result<SpawnResult, WorkerRunnerError> {
        // Step 1: eligibility gate. Delegation is unconditional; the
        // warning is advisory only.
        if spawn
            .execution_info()
            .get(SUPPORTS_WORKERS_KEY)
            .map(String::as_str)
            != Some(SUPPORTS_WORKERS_VALUE)
        {
            warn!(
                mnemonic = spawn.mnemonic(),
                reason = "REASON_NO_EXECUTION_INFO",
                "action does not declare supports-workers=1, delegating to fallback runner"
            );
            return self
                .fallback
                .exec(spawn, policy)
                .await
                .map_err(|source| WorkerRunnerError::FallbackFailed {
                    mnemonic: spawn.mnemonic().to_string(),
                    source,
                });
        }

        // Step 2: resource acquisition, released on every exit path via
        // `ResourceHandle`'s `Drop`.
        policy
            .report_progress(ProgressStatus::Scheduling, spawn.mnemonic())
            .await;
        let _resource_handle: ResourceHandle = self
            .resources
            .acquire(spawn.resource_owner(), spawn.local_resources())
            .await
            .map_err(|source| WorkerRunnerError::ResourceAcquisitionFailed {
                mnemonic: spawn.mnemonic().to_string(),
                source,
            })?;
        policy
            .report_progress(ProgressStatus::Executing, spawn.mnemonic())
            .await;

        // Step 3: tool presence.
        if spawn.tool_files().is_empty() {
            return Err(WorkerRunnerError::NoTools {
                mnemonic: spawn.mnemonic().to_string(),
            });
        }

        // Step 4: classifier output, key, request.
        let classified = classify(
            spawn.arguments(),
            spawn.mnemonic(),
            &self.config.extra_startup_flags_by_mnemonic,
        )?;

        let expanded_inputs =
            policy
                .expand_inputs(spawn)
                .await
                .map_err(|source| WorkerRunnerError::InputExpansionFailed {
                    mnemonic: spawn.mnemonic().to_string(),
                    source,
                })?;

        let input_file_layout = build_input_layout(spawn.execution_root(), &expanded_inputs);
        let tool_files_with_digests = tool_files_with_digests(policy, spawn.tool_files()).await;
        let output_files: BTreeSet<String> = spawn
            .output_files()
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let key = WorkerKey::new(
            classified.startup_args.clone(),
            spawn.environment().clone(),
            spawn.execution_root().to_path_buf(),
            spawn.mnemonic().to_string(),
            &tool_files_with_digests,
            input_file_layout,
            output_files,
            policy.speculating(),
        );

        let request = build_work_request(
            spawn.execution_root(),
            spawn.mnemonic(),
            &classified.flag_file_args,
            &expanded_inputs,
            policy,
        )
        .await?;

        // Step 5: borrow and drive the worker, timing wall-clock.
        let started = Instant::now();
        let borrowed = self
            .pool
            .borrow(&key)
            .await
            .map_err(|source| WorkerRunnerError::BorrowFailed {
                mnemonic: spawn.mnemonic().to_string(),
                source,
            })?;
        let mut worker = BorrowedWorker::new(borrowed, key.clone(), self.pool.clone());

        let outcome = run_exchange(spawn.mnemonic(), &key, worker.as_mut(), &request, policy).await;
        let wall_time = started.elapsed();

        // Worker lifecycle discipline: on any failure after a successful
        // borrow, invalidate; otherwise return for reuse. Never leaked —
        // and never returned for reuse — even if this future is cancelled
        // mid-exchange, since `BorrowedWorker::drop` invalidates by default.
        match outcome {
            Ok(response) => {
                worker.return_to_pool().await;

                // Step 6: commit the response.
                policy
                    .write_stderr(&response.output)
                    .await
                    .map_err(|source| WorkerRunnerError::StderrWriteFailed {
                        mnemonic: spawn.mnemonic().to_string(),
                        source,
                    })?;

                Ok(SpawnResult {
                    status: SpawnStatus::Success,
                    exit_code: response.exit_code,
                    wall_time,
                })
            }
            Err(err) => {
                worker.invalidate().await;
                Err(err)
            }
        }
    }
}

async fn run_exchange(
    mnemonic: &str,
    key: &WorkerKey,
    worker: &mut dyn Worker,
    request: &crate::proto::WorkRequest,
    policy: &dyn ExecutionPolicy,
) -> Result<WorkResponse, WorkerRunnerError> {
    worker
        .prepare_execution(key)
        .await
        .map_err(|source| WorkerRunnerError::PrepareFailed {
            mnemonic: mnemonic.to_string(),
            log_file: worker.log_file().map(Path::to_path_buf),
            source,
        })?;

    let log_file = worker.log_file().map(Path::to_path_buf);
    let (stdin, stdout) = worker.io();
    let mut reader = RecordingReader::new(stdout);
    let outcome = drive_exchange(mnemonic, stdin, &mut reader, request, log_file.as_deref()).await?;

    // lockOutputFiles runs whether the parse produced a response or a
    // clean EOF — step 4 precedes the null check at step 5 — but never on
    // a genuine parse exception, which already returned above.
    policy
        .lock_output_files()
        .await
        .map_err(|source| WorkerRunnerError::OutputLockFailed {
            mnemonic: mnemonic.to_string(),
            source,
        })?;

    let response = match outcome {
        ParsedOutcome::Response(response) => response,
        ParsedOutcome::NoResponse { log_excerpt } => {
            return Err(WorkerRunnerError::WorkerNoResponse {
                mnemonic: mnemonic.to_string(),
                log_file,
                log_excerpt,
            })
        }
    };

    worker
        .finish_execution(key)
        .await
        .map_err(|source| WorkerRunnerError::FinishFailed {
            mnemonic: mnemonic.to_string(),
            source,
        })?;

    Ok(response)
}

fn build_input_layout(exec_root: &Path, inputs: &[PathBuf]) -> BTreeMap<String, PathBuf> {
    inputs
        .iter()
        .map(|path| {
            let rel = path
                .strip_prefix(exec_root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            (rel, path.clone())
        })
        .collect()
}

async fn tool_files_with_digests(
    policy: &dyn ExecutionPolicy,
    tool_files: &[PathBuf],
) -> Vec<(PathBuf, Option<String>)> {
    let mut out = Vec::with_capacity(tool_files.len());
    for path in tool_files {
        let digest = policy.input_digest(path).await;
        out.push((path.clone(), digest));
    }
    out
}
