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

//! Assembles a `WorkRequest` from the classifier's flag-file arguments and
//! the spawn's expanded inputs.

use crate::error::WorkerRunnerError;
use crate::proto::{Input, WorkRequest};
use crate::spawn::ExecutionPolicy;
use std::path::{Path, PathBuf};

/// Flag-file graphs are assumed acyclic; this bound turns an accidental
/// cycle (a flag file that, directly or through a short chain, includes
/// itself) into a loud error instead of a wedged worker-pool thread.
const MAX_FLAG_FILE_EXPANSION_DEPTH: usize = 64;

/// Expands one argument into zero or more literal arguments, appended to
/// `out`. A leading `@` (but not `@@`) triggers a recursive flag-file read;
/// every other form, including `-flagfile=`/`--flagfile=` and the `@@`
/// escape, passes through unchanged.
pub async fn expand_argument(
    exec_root: &Path,
    mnemonic: &str,
    arg: &str,
    depth: usize,
    out: &mut Vec<String>,
) -> Result<(), WorkerRunnerError> {
    if arg.starts_with('@') && !arg.starts_with("@@") {
        if depth >= MAX_FLAG_FILE_EXPANSION_DEPTH {
            return Err(WorkerRunnerError::FlagFileExpansionTooDeep {
                mnemonic: mnemonic.to_string(),
                path: exec_root.join(&arg[1..]),
            });
        }

        let path = exec_root.join(&arg[1..]);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| WorkerRunnerError::FlagFileReadFailed {
                mnemonic: mnemonic.to_string(),
                path: path.clone(),
                source,
            })?;

        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            Box::pin(expand_argument(exec_root, mnemonic, line, depth + 1, out)).await?;
        }
        Ok(())
    } else {
        out.push(arg.to_string());
        Ok(())
    }
}

fn exec_relative_path(exec_root: &Path, input: &Path) -> String {
    input
        .strip_prefix(exec_root)
        .unwrap_or(input)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Builds the wire request: expanded flag-file arguments, plus one
/// `{path, digest}` record per input (digest is the empty string, never
/// omitted, when metadata is unavailable).
pub async fn build_work_request(
    exec_root: &Path,
    mnemonic: &str,
    flag_file_args: &[String],
    expanded_inputs: &[PathBuf],
    policy: &dyn ExecutionPolicy,
) -> Result<WorkRequest, WorkerRunnerError> {
    let mut arguments = Vec::new();
    for arg in flag_file_args {
        expand_argument(exec_root, mnemonic, arg, 0, &mut arguments).await?;
    }

    let mut inputs = Vec::with_capacity(expanded_inputs.len());
    for input in expanded_inputs {
        let digest = policy.input_digest(input).await.unwrap_or_default();
        inputs.push(Input {
            path: exec_relative_path(exec_root, input),
            digest,
        });
    }

    Ok(WorkRequest {
        arguments,
        inputs,
        request_id: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Runtime::new().unwrap().block_on(future)
    }

    #[test]
    fn literal_arguments_are_a_fixed_point() {
        let mut out = Vec::new();
        let exec_root = std::env::temp_dir();
        block_on(expand_argument(&exec_root, "M", "--source", 0, &mut out)).unwrap();
        assert_eq!(out, vec!["--source".to_string()]);
    }

    #[test]
    fn double_at_passes_through_literally() {
        let mut out = Vec::new();
        let exec_root = std::env::temp_dir();
        block_on(expand_argument(&exec_root, "M", "@@literal", 0, &mut out)).unwrap();
        assert_eq!(out, vec!["@@literal".to_string()]);
    }

    #[test]
    fn flagfile_form_is_passed_through_without_expansion() {
        let mut out = Vec::new();
        let exec_root = std::env::temp_dir();
        block_on(expand_argument(
            &exec_root,
            "M",
            "--flagfile=opts.txt",
            0,
            &mut out,
        ))
        .unwrap();
        assert_eq!(out, vec!["--flagfile=opts.txt".to_string()]);
    }

    #[test]
    fn expands_at_file_recursively_skipping_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("opts.txt"), "--source\n\n1.8\n").unwrap();

        let mut out = Vec::new();
        block_on(expand_argument(dir.path(), "M", "@opts.txt", 0, &mut out)).unwrap();
        assert_eq!(out, vec!["--source".to_string(), "1.8".to_string()]);
    }
}
