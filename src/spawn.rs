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

//! The inputs the orchestrator consumes: a `Spawn` describing one action
//! invocation, and an `ExecutionPolicy` the embedding build system supplies
//! for progress reporting, metadata lookup, and output commitment.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CPU/memory reservation an action declares it needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalResources {
    pub cpu: f64,
    pub memory_mb: u64,
}

/// Opaque identity the resource manager charges a reservation against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceOwner(pub String);

/// One process invocation specification produced by the build graph.
///
/// Implemented by the caller; this crate never constructs a `Spawn` itself.
pub trait Spawn: Send + Sync {
    fn arguments(&self) -> &[String];
    fn environment(&self) -> &BTreeMap<String, String>;
    fn mnemonic(&self) -> &str;
    fn execution_root(&self) -> &Path;
    fn tool_files(&self) -> &[PathBuf];
    fn input_files(&self) -> &[PathBuf];
    fn output_files(&self) -> &[PathBuf];
    fn execution_info(&self) -> &BTreeMap<String, String>;
    fn local_resources(&self) -> &LocalResources;
    fn resource_owner(&self) -> &ResourceOwner;
}

/// Progress phases reported around resource acquisition, always tagged
/// `"worker"` per the external-interfaces contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Scheduling,
    Executing,
}

impl ProgressStatus {
    pub fn label(self) -> &'static str {
        "worker"
    }
}

/// Callbacks the orchestrator needs from the embedding build system.
#[async_trait]
pub trait ExecutionPolicy: Send + Sync {
    async fn report_progress(&self, status: ProgressStatus, mnemonic: &str);

    /// Digest for a single file, or `None` if no metadata is available.
    /// Never fails: an unavailable digest is a normal outcome, not an error.
    async fn input_digest(&self, path: &Path) -> Option<String>;

    /// Resolve the spawn's declared input files into the concrete file list
    /// to digest and send, expanding any artifact trees.
    async fn expand_inputs(&self, spawn: &dyn Spawn) -> anyhow::Result<Vec<PathBuf>>;

    /// Append bytes to the action's stderr stream.
    async fn write_stderr(&self, bytes: &[u8]) -> std::io::Result<()>;

    /// Commit the spawn's declared outputs. Must be called at most once per
    /// `exec` invocation, and only after a response has been parsed.
    async fn lock_output_files(&self) -> anyhow::Result<()>;

    /// Whether this invocation is one of several speculative attempts at
    /// the same logical action.
    fn speculating(&self) -> bool;
}

/// The exchange succeeded and a response was parsed; `exit_code` may still
/// be non-zero, which the caller interprets as an action-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnStatus {
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnResult {
    pub status: SpawnStatus,
    pub exit_code: i32,
    pub wall_time: Duration,
}
