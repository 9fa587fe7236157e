// Copyright (c) 2026 Bitmesh
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! File packet TLV codec, v2 form (spec §4.1, §9 Open Question: the source
//! carries both an 8-byte-FILE_SIZE/2-byte-CONTENT-length v1 form and this
//! 4-byte/4-byte v2 form; this crate implements v2 only).

use thiserror::Error;

const TYPE_FILE_NAME: u8 = 0x01;
const TYPE_FILE_SIZE: u8 = 0x02;
const TYPE_MIME_TYPE: u8 = 0x03;
const TYPE_CONTENT: u8 = 0x04;

const DEFAULT_FILE_NAME: &str = "file";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Absolute ceiling on a file packet's total encoded payload, shared by
/// images and voice notes (spec §6).
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// File TLV codec errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FileTlvError {
    /// Truncated stream or a length that runs off the buffer.
    #[error("malformed file TLV")]
    Malformed,
    /// An unrecognized type byte.
    #[error("unknown TLV type {0:#04x}")]
    UnknownType(u8),
    /// `FILE_SIZE` value was present but not exactly 4 bytes.
    #[error("invalid file size encoding")]
    InvalidFileSize,
    /// Decoded content was empty.
    #[error("empty content")]
    EmptyContent,
    /// Total encoded payload exceeds the 1 MiB ceiling.
    #[error("payload too large")]
    TooLarge,
}

/// A decoded file transfer packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePacket {
    /// File name (UTF-8, at most 65535 bytes on the wire).
    pub file_name: String,
    /// Declared file size; defaults to `content.len()` when the TLV is
    /// absent on decode.
    pub file_size: u32,
    /// MIME type (UTF-8, at most 65535 bytes on the wire).
    pub mime_type: String,
    /// File content bytes.
    pub content: Vec<u8>,
}

impl FilePacket {
    /// Encode as a TLV stream. `file_name`/`mime_type` are silently
    /// truncated to 65535 bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.content.len() + 64);

        let name_bytes = truncate_utf8(&self.file_name, u16::MAX as usize);
        push_short_tlv(&mut out, TYPE_FILE_NAME, name_bytes.as_bytes());

        push_short_tlv(&mut out, TYPE_FILE_SIZE, &self.file_size.to_be_bytes());

        let mime_bytes = truncate_utf8(&self.mime_type, u16::MAX as usize);
        push_short_tlv(&mut out, TYPE_MIME_TYPE, mime_bytes.as_bytes());

        out.push(TYPE_CONTENT);
        let len = self.content.len() as u32;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&self.content);

        out
    }

    /// Decode a TLV stream, tolerating reordering and missing optional
    /// fields, and defensively concatenating multiple `CONTENT` TLVs.
    pub fn decode(buf: &[u8]) -> Result<Self, FileTlvError> {
        if buf.len() > MAX_PAYLOAD_BYTES {
            return Err(FileTlvError::TooLarge);
        }

        let mut file_name: Option<String> = None;
        let mut file_size: Option<u32> = None;
        let mut mime_type: Option<String> = None;
        let mut content: Vec<u8> = Vec::new();

        let mut pos = 0usize;
        while pos < buf.len() {
            let ty = buf[pos];
            pos += 1;

            match ty {
                TYPE_FILE_NAME | TYPE_FILE_SIZE | TYPE_MIME_TYPE => {
                    let len = read_u16(buf, &mut pos)?;
                    let value = read_n(buf, &mut pos, len as usize)?;
                    match ty {
                        TYPE_FILE_NAME => {
                            file_name = Some(String::from_utf8_lossy(value).into_owned());
                        }
                        TYPE_MIME_TYPE => {
                            mime_type = Some(String::from_utf8_lossy(value).into_owned());
                        }
                        TYPE_FILE_SIZE => {
                            if value.len() != 4 {
                                return Err(FileTlvError::InvalidFileSize);
                            }
                            file_size = Some(u32::from_be_bytes(value.try_into().unwrap()));
                        }
                        _ => unreachable!(),
                    }
                }
                TYPE_CONTENT => {
                    let len = read_u32(buf, &mut pos)?;
                    let value = read_n(buf, &mut pos, len as usize)?;
                    content.extend_from_slice(value);
                }
                other => return Err(FileTlvError::UnknownType(other)),
            }
        }

        if content.is_empty() {
            return Err(FileTlvError::EmptyContent);
        }

        Ok(FilePacket {
            file_name: file_name.unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
            file_size: file_size.unwrap_or(content.len() as u32),
            mime_type: mime_type.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            content,
        })
    }
}

fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn push_short_tlv(out: &mut Vec<u8>, ty: u8, value: &[u8]) {
    out.push(ty);
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
}

fn read_u16(buf: &[u8], pos: &mut usize) -> Result<u16, FileTlvError> {
    let b = read_n(buf, pos, 2)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Result<u32, FileTlvError> {
    let b = read_n(buf, pos, 4)?;
    Ok(u32::from_be_bytes(b.try_into().unwrap()))
}

fn read_n<'a>(buf: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8], FileTlvError> {
    if *pos + n > buf.len() {
        return Err(FileTlvError::Malformed);
    }
    let out = &buf[*pos..*pos + n];
    *pos += n;
    Ok(out)
}
