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

//! Contract a concrete worker pool must satisfy. The pool itself (process
//! spawn, log file management) lives outside this crate, which only
//! consumes it.

use crate::key::WorkerKey;
use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};

/// A live, pooled worker process. Exclusively owned by whoever borrowed it
/// until it is returned or invalidated.
#[async_trait]
pub trait Worker: Send {
    /// Returns the worker's stdin and stdout in one call, so both can be
    /// held mutably at once without aliasing through a trait object.
    fn io(&mut self) -> (&mut (dyn AsyncWrite + Send + Unpin), &mut (dyn AsyncRead + Send + Unpin));

    fn log_file(&self) -> Option<&Path>;

    async fn prepare_execution(&mut self, key: &WorkerKey) -> anyhow::Result<()>;

    async fn finish_execution(&mut self, key: &WorkerKey) -> anyhow::Result<()>;
}

/// Borrow/return/invalidate worker objects keyed by `WorkerKey`.
#[async_trait]
pub trait WorkerPool: Send + Sync {
    /// May block; fails with an I/O error if no worker could be started or
    /// claimed. The returned worker is live: stdout is open for reading,
    /// stdin for writing.
    async fn borrow(&self, key: &WorkerKey) -> anyhow::Result<Box<dyn Worker>>;

    /// Returns a healthy worker for reuse.
    async fn return_worker(&self, key: &WorkerKey, worker: Box<dyn Worker>);

    /// Terminates and discards a worker. Must not panic; callers swallow
    /// any logged failure in favor of the error that triggered invalidation.
    async fn invalidate(&self, key: &WorkerKey, worker: Box<dyn Worker>);
}
