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

//! Configuration this crate consumes but never loads itself: CLI parsing
//! and config-file loading stay with the embedding build system, which
//! deserializes this from whatever config surface it already has.

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerRunnerConfig {
    /// Extra startup flags appended after `--persistent_worker`, keyed by
    /// mnemonic, in configured order.
    #[serde(default)]
    pub extra_startup_flags_by_mnemonic: BTreeMap<String, Vec<String>>,
}
