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

//! Content-addressed identity of a worker instance: two keys are equal iff
//! the worker behind them is safely interchangeable for the action.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Stored in `BTreeMap`/`BTreeSet` rather than hashmaps so that `Hash` and
/// `Eq` fall out of the derive as order-independent and stable within a
/// process, without hand-rolled canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerKey {
    startup_args: Vec<String>,
    environment: BTreeMap<String, String>,
    exec_root: PathBuf,
    mnemonic: String,
    tool_files_digest: [u8; 32],
    input_file_layout: BTreeMap<String, PathBuf>,
    output_files: BTreeSet<String>,
    speculating: bool,
}

impl WorkerKey {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        startup_args: Vec<String>,
        environment: BTreeMap<String, String>,
        exec_root: PathBuf,
        mnemonic: String,
        tool_files: &[(PathBuf, Option<String>)],
        input_file_layout: BTreeMap<String, PathBuf>,
        output_files: BTreeSet<String>,
        speculating: bool,
    ) -> Self {
        Self {
            startup_args,
            environment,
            exec_root,
            mnemonic,
            tool_files_digest: hash_tool_files(tool_files),
            input_file_layout,
            output_files,
            speculating,
        }
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn exec_root(&self) -> &Path {
        &self.exec_root
    }
}

/// Pure function of tool-file paths and their metadata digests;
/// order-insensitive because the caller may discover tool files in any
/// order, and stable because it feeds straight into `Hash`.
fn hash_tool_files(tool_files: &[(PathBuf, Option<String>)]) -> [u8; 32] {
    let mut entries: Vec<String> = tool_files
        .iter()
        .map(|(path, digest)| format!("{}\0{}", path.to_string_lossy(), digest.as_deref().unwrap_or("")))
        .collect();
    entries.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    for entry in &entries {
        hasher.update(entry.as_bytes());
        hasher.update(b"\n");
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    fn sample_key(speculating: bool) -> WorkerKey {
        WorkerKey::new(
            vec!["javac".to_string(), "--persistent_worker".to_string()],
            BTreeMap::new(),
            PathBuf::from("/exec-root"),
            "Javac".to_string(),
            &[(PathBuf::from("javac_bin"), Some("abc".to_string()))],
            BTreeMap::new(),
            BTreeSet::new(),
            speculating,
        )
    }

    #[test]
    fn tool_file_hash_is_order_insensitive() {
        let a = hash_tool_files(&[
            (PathBuf::from("a"), Some("1".to_string())),
            (PathBuf::from("b"), Some("2".to_string())),
        ]);
        let b = hash_tool_files(&[
            (PathBuf::from("b"), Some("2".to_string())),
            (PathBuf::from("a"), Some("1".to_string())),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn speculating_flag_distinguishes_otherwise_identical_keys() {
        assert_ne!(sample_key(true), sample_key(false));
    }

    #[test]
    fn equal_keys_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut h1 = DefaultHasher::new();
        let mut h2 = DefaultHasher::new();
        sample_key(false).hash(&mut h1);
        sample_key(false).hash(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }
}
