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

//! Performs exactly one request/response exchange over a borrowed worker:
//! write one length-delimited `WorkRequest`, read one length-delimited
//! `WorkResponse`. No pipelining.

use crate::error::{WorkerRunnerError, LOG_EXCERPT_LIMIT};
use crate::proto::{WorkRequest, WorkResponse};
use crate::recording::RecordingReader;
use prost::Message;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// What the parse attempt produced, *before* the caller has had a chance
/// to lock output files. A clean EOF is `NoResponse`, not an error here:
/// output files still get locked before the caller turns a missing
/// response into a `WorkerNoResponse` failure.
pub enum ParsedOutcome {
    Response(WorkResponse),
    NoResponse { log_excerpt: String },
}

/// Writes `request`, flushes, then reads one delimited response while
/// recording the bytes that went by, for diagnostics on failure. Only a
/// genuine parse exception (malformed bytes, truncated payload) is
/// surfaced as `Err`; a clean EOF before any response bytes is returned as
/// `Ok(ParsedOutcome::NoResponse)` so the caller can still lock outputs
/// first.
pub async fn drive_exchange<W, R>(
    mnemonic: &str,
    writer: &mut W,
    reader: &mut RecordingReader<R>,
    request: &WorkRequest,
    log_file: Option<&Path>,
) -> Result<ParsedOutcome, WorkerRunnerError>
where
    W: AsyncWrite + Unpin + ?Sized,
    R: AsyncRead + Unpin,
{
    write_delimited(writer, request)
        .await
        .map_err(|source| WorkerRunnerError::WriteFailed {
            mnemonic: mnemonic.to_string(),
            log_file: log_file.map(Path::to_path_buf),
            source: source.into(),
        })?;

    reader.start_recording();

    match read_delimited::<WorkResponse, _>(reader).await {
        Ok(Some(response)) => Ok(ParsedOutcome::Response(response)),
        Ok(None) => Ok(ParsedOutcome::NoResponse {
            log_excerpt: excerpt(&reader.recorded()),
        }),
        Err(source) => Err(WorkerRunnerError::ParseFailed {
            mnemonic: mnemonic.to_string(),
            recorded: excerpt(&reader.recorded()),
            source,
        }),
    }
}

fn excerpt(bytes: &[u8]) -> String {
    let truncated = &bytes[..bytes.len().min(LOG_EXCERPT_LIMIT)];
    String::from_utf8_lossy(truncated).into_owned()
}

async fn write_delimited<W: AsyncWrite + Unpin + ?Sized>(
    writer: &mut W,
    message: &WorkRequest,
) -> std::io::Result<()> {
    let payload = message.encode_to_vec();
    let mut len_buf = Vec::with_capacity(10);
    prost::encoding::encode_varint(payload.len() as u64, &mut len_buf);
    writer.write_all(&len_buf).await?;
    writer.write_all(&payload).await?;
    writer.flush().await
}

/// Reads one varint-length-prefixed message. Returns `Ok(None)` only on a
/// clean EOF before any byte of a new message arrives.
async fn read_delimited<M: Message + Default, R: AsyncRead + Unpin>(
    reader: &mut R,
) -> anyhow::Result<Option<M>> {
    let len = match read_varint(reader).await? {
        Some(len) => len,
        None => return Ok(None),
    };
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(Some(M::decode(buf.as_slice())?))
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> anyhow::Result<Option<u64>> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            return if shift == 0 {
                Ok(None)
            } else {
                anyhow::bail!("worker closed its output in the middle of a varint length prefix")
            };
        }
        let b = byte[0];
        value |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok(Some(value));
        }
        shift += 7;
        if shift >= 64 {
            anyhow::bail!("varint length prefix exceeds 64 bits");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Runtime::new().unwrap().block_on(future)
    }

    #[test]
    fn round_trips_a_request_and_response() {
        block_on(async {
            let request = WorkRequest {
                arguments: vec!["--source".to_string(), "1.8".to_string()],
                inputs: vec![],
                request_id: 0,
            };

            let mut wire = Vec::new();
            write_delimited(&mut wire, &request).await.unwrap();

            let response = WorkResponse {
                exit_code: 0,
                output: b"ok".to_vec(),
                request_id: 0,
            };
            let mut response_wire = Vec::new();
            let payload = response.encode_to_vec();
            prost::encoding::encode_varint(payload.len() as u64, &mut response_wire);
            response_wire.extend_from_slice(&payload);

            let mut reader = RecordingReader::new(response_wire.as_slice());
            reader.start_recording();
            let parsed = read_delimited::<WorkResponse, _>(&mut reader)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(parsed, response);
        });
    }

    #[test]
    fn eof_before_any_byte_is_a_clean_none() {
        block_on(async {
            let empty: &[u8] = &[];
            let mut reader = RecordingReader::new(empty);
            let parsed = read_delimited::<WorkResponse, _>(&mut reader).await.unwrap();
            assert!(parsed.is_none());
        });
    }

    #[test]
    fn eof_mid_message_is_an_error() {
        block_on(async {
            // valid varint length of 5, but only 2 payload bytes follow
            let truncated: &[u8] = &[5, 1, 2];
            let mut reader = RecordingReader::new(truncated);
            let result = read_delimited::<WorkResponse, _>(&mut reader).await;
            assert!(result.is_err());
        });
    }
}
