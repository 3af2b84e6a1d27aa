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

use std::path::PathBuf;
use thiserror::Error;

/// Bound applied to any recorded worker log excerpt attached to an error.
pub const LOG_EXCERPT_LIMIT: usize = 4096;

/// User-visible failures from the worker spawn runner, one variant per row
/// of the error table. `NO_EXECUTION_INFO` is deliberately absent here: it
/// is a normal branch (delegate to fallback) rather than an error.
#[derive(Debug, Error)]
pub enum WorkerRunnerError {
    #[error("{mnemonic}: action declares no tool files")]
    NoTools { mnemonic: String },

    #[error("{mnemonic}: argv contains no flag-file argument")]
    NoFlagfile { mnemonic: String },

    #[error("{mnemonic}: could not acquire local resources")]
    ResourceAcquisitionFailed {
        mnemonic: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{mnemonic}: failed to expand action inputs")]
    InputExpansionFailed {
        mnemonic: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{mnemonic}: failed to borrow a worker from the pool")]
    BorrowFailed {
        mnemonic: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{mnemonic}: worker rejected prepareExecution")]
    PrepareFailed {
        mnemonic: String,
        log_file: Option<PathBuf>,
        #[source]
        source: anyhow::Error,
    },

    #[error("{mnemonic}: failed to write the work request; the worker likely quit or closed stdin")]
    WriteFailed {
        mnemonic: String,
        log_file: Option<PathBuf>,
        #[source]
        source: anyhow::Error,
    },

    #[error("{mnemonic}: failed to parse the work response")]
    ParseFailed {
        mnemonic: String,
        /// Up to `LOG_EXCERPT_LIMIT` bytes recorded off the worker's stdout since the write.
        recorded: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{mnemonic}: worker closed its output before a complete response arrived")]
    WorkerNoResponse {
        mnemonic: String,
        log_file: Option<PathBuf>,
        log_excerpt: String,
    },

    #[error("{mnemonic}: worker rejected finishExecution")]
    FinishFailed {
        mnemonic: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{mnemonic}: flag-file expansion recursed past the allowed depth at {path}; the flag-file graph is likely cyclic")]
    FlagFileExpansionTooDeep { mnemonic: String, path: PathBuf },

    #[error("{mnemonic}: failed to read flag file {path}")]
    FlagFileReadFailed {
        mnemonic: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{mnemonic}: fallback runner failed")]
    FallbackFailed {
        mnemonic: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{mnemonic}: failed to write worker output to stderr")]
    StderrWriteFailed {
        mnemonic: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{mnemonic}: failed to lock output files")]
    OutputLockFailed {
        mnemonic: String,
        #[source]
        source: anyhow::Error,
    },
}

impl WorkerRunnerError {
    pub fn mnemonic(&self) -> &str {
        match self {
            Self::NoTools { mnemonic }
            | Self::NoFlagfile { mnemonic }
            | Self::ResourceAcquisitionFailed { mnemonic, .. }
            | Self::InputExpansionFailed { mnemonic, .. }
            | Self::BorrowFailed { mnemonic, .. }
            | Self::PrepareFailed { mnemonic, .. }
            | Self::WriteFailed { mnemonic, .. }
            | Self::ParseFailed { mnemonic, .. }
            | Self::WorkerNoResponse { mnemonic, .. }
            | Self::FinishFailed { mnemonic, .. }
            | Self::FlagFileExpansionTooDeep { mnemonic, .. }
            | Self::FlagFileReadFailed { mnemonic, .. }
            | Self::FallbackFailed { mnemonic, .. }
            | Self::StderrWriteFailed { mnemonic, .. }
            | Self::OutputLockFailed { mnemonic, .. } => mnemonic,
        }
    }
}
