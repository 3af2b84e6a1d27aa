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

//! Resource accounting itself lives outside this crate; this module only
//! defines the collaborator contract the orchestrator needs, injected so
//! tests can substitute a deterministic implementation.

use crate::spawn::{LocalResources, ResourceOwner};
use async_trait::async_trait;

/// A process-wide (or test-local) accountant for CPU/memory reservations.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    async fn acquire(
        &self,
        owner: &ResourceOwner,
        resources: &LocalResources,
    ) -> anyhow::Result<ResourceHandle>;
}

/// Scoped reservation. Released exactly once, on drop, regardless of which
/// exit path the orchestrator takes.
pub struct ResourceHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ResourceHandle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle that releases nothing; useful for managers with no actual
    /// accounting to perform.
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
