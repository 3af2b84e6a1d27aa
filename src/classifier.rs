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

//! Splits an action's argv into startup arguments (baked into the worker's
//! process launch) and flag-file arguments (sent fresh with every request).

use crate::error::WorkerRunnerError;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static FLAG_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(@|-{1,2}flagfile=).+").unwrap());

pub const PERSISTENT_WORKER_FLAG: &str = "--persistent_worker";

/// Matches the bare syntactic shape only; the `@@` escape is unwrapped
/// later, during expansion, not here. An escaped argument still belongs
/// in the flag-file partition so it's sent fresh with every request
/// instead of being frozen into the worker's startup argv.
fn is_flag_file_reference(arg: &str) -> bool {
    FLAG_FILE_RE.is_match(arg)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedArguments {
    pub startup_args: Vec<String>,
    pub flag_file_args: Vec<String>,
}

/// Partitions `argv`, then appends `--persistent_worker` and any
/// mnemonic-specific extras to the startup side. Fails `NO_FLAGFILE` if no
/// argument matched the flag-file partition: the worker protocol requires
/// per-request work to arrive via a flag file, never baked into argv.
pub fn classify(
    argv: &[String],
    mnemonic: &str,
    extra_flags_by_mnemonic: &BTreeMap<String, Vec<String>>,
) -> Result<ClassifiedArguments, WorkerRunnerError> {
    let mut startup_args = Vec::with_capacity(argv.len());
    let mut flag_file_args = Vec::new();

    for arg in argv {
        if is_flag_file_reference(arg) {
            flag_file_args.push(arg.clone());
        } else {
            startup_args.push(arg.clone());
        }
    }

    if flag_file_args.is_empty() {
        return Err(WorkerRunnerError::NoFlagfile {
            mnemonic: mnemonic.to_string(),
        });
    }

    startup_args.push(PERSISTENT_WORKER_FLAG.to_string());
    if let Some(extras) = extra_flags_by_mnemonic.get(mnemonic) {
        startup_args.extend(extras.iter().cloned());
    }

    Ok(ClassifiedArguments {
        startup_args,
        flag_file_args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partitions_at_and_flagfile_forms() {
        let result = classify(
            &argv(&["javac", "@opts.txt", "-flagfile=a.txt", "--flagfile=b.txt"]),
            "Javac",
            &BTreeMap::new(),
        )
        .unwrap();

        assert_eq!(result.startup_args, vec!["javac", "--persistent_worker"]);
        assert_eq!(result.flag_file_args, vec!["@opts.txt", "-flagfile=a.txt", "--flagfile=b.txt"]);
    }

    #[test]
    fn double_at_is_still_a_flag_file_argument() {
        let result = classify(&argv(&["tool", "@real.txt", "@@literal"]), "Tool", &BTreeMap::new()).unwrap();
        assert_eq!(result.startup_args, vec!["tool", "--persistent_worker"]);
        assert_eq!(result.flag_file_args, vec!["@real.txt", "@@literal"]);
    }

    #[test]
    fn no_flagfile_is_an_error() {
        let err = classify(&argv(&["javac", "-source", "1.8"]), "Javac", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, WorkerRunnerError::NoFlagfile { .. }));
    }

    #[test]
    fn mnemonic_extras_follow_persistent_worker_flag() {
        let mut extras = BTreeMap::new();
        extras.insert("Javac".to_string(), vec!["--foo".to_string(), "--bar".to_string()]);

        let result = classify(&argv(&["javac", "@opts.txt"]), "Javac", &extras).unwrap();

        assert_eq!(
            result.startup_args,
            vec!["javac", "--persistent_worker", "--foo", "--bar"]
        );
    }

    #[test]
    fn partitioning_is_a_multiset_split_of_argv() {
        let original = argv(&["a", "@f1", "b", "-flagfile=f2", "c"]);
        let result = classify(&original, "M", &BTreeMap::new()).unwrap();

        let mut recombined: Vec<&str> = result
            .startup_args
            .iter()
            .filter(|a| a.as_str() != PERSISTENT_WORKER_FLAG)
            .map(String::as_str)
            .chain(result.flag_file_args.iter().map(String::as_str))
            .collect();
        recombined.sort();
        let mut expected: Vec<&str> = original.iter().map(String::as_str).collect();
        expected.sort();
        assert_eq!(recombined, expected);
    }
}
