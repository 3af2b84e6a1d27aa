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

//! The conventional (one-shot) spawn runner lives outside this crate;
//! this is only the capability it delegates to when an action is not
//! worker-eligible.

use crate::spawn::{ExecutionPolicy, Spawn, SpawnResult};
use async_trait::async_trait;

#[async_trait]
pub trait SpawnRunner: Send + Sync {
    async fn exec(&self, spawn: &dyn Spawn, policy: &dyn ExecutionPolicy) -> anyhow::Result<SpawnResult>;
}
