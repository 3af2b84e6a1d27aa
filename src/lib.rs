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

//! A spawn strategy that multiplexes build actions over long-lived
//! persistent worker processes instead of forking a fresh process per
//! action. An eligible action's arguments are classified into startup
//! args (baked into the worker's launch) and flag-file args (sent fresh
//! with every request) and exchanged with a pooled worker over a
//! length-delimited protobuf protocol; anything not worker-eligible is
//! delegated to a conventional fallback runner.

pub mod classifier;
pub mod config;
pub mod driver;
pub mod error;
pub mod fallback;
pub mod key;
pub mod orchestrator;
pub mod pool;
pub mod proto;
pub mod recording;
pub mod request;
pub mod resource;
pub mod spawn;

pub use config::WorkerRunnerConfig;
pub use error::WorkerRunnerError;
pub use fallback::SpawnRunner;
pub use key::WorkerKey;
pub use orchestrator::WorkerSpawnRunner;
pub use pool::{Worker, WorkerPool};
pub use resource::{ResourceHandle, ResourceManager};
pub use spawn::{ExecutionPolicy, LocalResources, ProgressStatus, ResourceOwner, Spawn, SpawnResult, SpawnStatus};

#[cfg(test)]
test_r::enable!();
