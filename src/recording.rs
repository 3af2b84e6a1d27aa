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

//! A reader that remembers the last `WINDOW` bytes that passed through it
//! since `start_recording` was last called, so a parse failure can attach
//! what the worker actually sent.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

pub const WINDOW: usize = 4096;

pub struct RecordingReader<R> {
    inner: R,
    window: VecDeque<u8>,
}

impl<R: AsyncRead + Unpin> RecordingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            window: VecDeque::with_capacity(WINDOW),
        }
    }

    pub fn start_recording(&mut self) {
        self.window.clear();
    }

    pub fn recorded(&self) -> Vec<u8> {
        self.window.iter().copied().collect()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for RecordingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let result = Pin::new(&mut this.inner).poll_read(cx, buf);
        if result.is_ready() && result.as_ref().map(|r| r.is_ok()).unwrap_or(false) {
            for &byte in &buf.filled()[before..] {
                if this.window.len() == WINDOW {
                    this.window.pop_front();
                }
                this.window.push_back(byte);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;
    use tokio::io::AsyncReadExt;

    #[test]
    fn records_only_since_last_start_recording() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let data = b"hello world".to_vec();
            let mut reader = RecordingReader::new(data.as_slice());

            let mut buf = [0u8; 5];
            reader.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"hello");

            reader.start_recording();
            let mut rest = Vec::new();
            reader.read_to_end(&mut rest).await.unwrap();

            assert_eq!(reader.recorded(), b" world".to_vec());
        });
    }

    #[test]
    fn window_is_bounded() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let data = vec![b'x'; WINDOW + 100];
            let mut reader = RecordingReader::new(data.as_slice());
            reader.start_recording();

            let mut sink = Vec::new();
            reader.read_to_end(&mut sink).await.unwrap();

            assert_eq!(reader.recorded().len(), WINDOW);
        });
    }
}
