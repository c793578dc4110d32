//! Text blob encoding: `base64(version ++ brotli(packed payload))`

use std::io::{self, Read, Write};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::codec::migrate::{is_supported, packed_len, VersionedPayload};
use crate::codec::versions::PayloadV3;
use crate::constants::{
    COMPRESSION_BUFFER_SIZE, CURRENT_WIRE_VERSION, DEFAULT_COMPRESSION_QUALITY,
    DEFAULT_COMPRESSION_WINDOW, DEFAULT_MAX_PAYLOAD_BYTES,
};
use crate::types::{AppearanceRecord, ApplyMask, Error, Result};

/// A decoded blob, already migrated to the current version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedDesign {
    /// Values
    pub record: AppearanceRecord,
    /// Applied fields
    pub mask: ApplyMask,
    /// Version the blob was written with
    pub version: u8,
    /// Write protection carried by blobs older than version 3
    pub legacy_write_protected: Option<bool>,
}

/// Encoder and decoder for shareable design blobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireCodec {
    quality: u32,
    window: u32,
    max_payload: usize,
}

impl Default for WireCodec {
    fn default() -> Self {
        Self {
            quality: DEFAULT_COMPRESSION_QUALITY,
            window: DEFAULT_COMPRESSION_WINDOW,
            max_payload: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

impl WireCodec {
    /// Create a codec. Quality is clamped to 0..=11 and the window to 10..=24.
    pub fn new(quality: u32, window: u32, max_payload: usize) -> Self {
        Self {
            quality: quality.min(11),
            window: window.clamp(10, 24),
            max_payload,
        }
    }

    /// Largest decompressed payload accepted
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Encode a record and mask at the current version
    pub fn encode(&self, record: &AppearanceRecord, mask: ApplyMask) -> Result<String> {
        let payload = PayloadV3::from_design(record, mask).pack();
        self.encode_payload(CURRENT_WIRE_VERSION, &payload)
    }

    /// Wrap an already packed payload of any version
    pub fn encode_payload(&self, version: u8, payload: &[u8]) -> Result<String> {
        let mut writer = brotli::CompressorWriter::new(
            Vec::new(),
            COMPRESSION_BUFFER_SIZE,
            self.quality,
            self.window,
        );
        writer
            .write_all(payload)
            .map_err(|e| Error::invalid_state(format!("compression failed: {}", e)))?;
        let compressed = writer.into_inner();

        let mut bytes = Vec::with_capacity(compressed.len() + 1);
        bytes.push(version);
        bytes.extend_from_slice(&compressed);
        Ok(STANDARD.encode(bytes))
    }

    /// Split a blob into its version byte and decompressed payload without parsing it
    pub fn unwrap_payload(&self, blob: &str) -> Result<(u8, Vec<u8>)> {
        let blob = blob.trim();
        if blob.is_empty() {
            return Err(Error::Truncated { version: 0, expected: 1, actual: 0 });
        }
        let bytes = STANDARD
            .decode(blob)
            .map_err(|e| Error::invalid_state(format!("invalid base64: {}", e)))?;
        let (&version, compressed) = bytes
            .split_first()
            .ok_or(Error::Truncated { version: 0, expected: 1, actual: 0 })?;
        if !is_supported(version) {
            return Err(Error::UnsupportedVersion(version));
        }

        if compressed.is_empty() {
            return Err(Error::Truncated { version, expected: packed_len(version), actual: 0 });
        }

        let mut input = StreamInput { data: compressed, exhausted: false };
        let mut payload = Vec::new();
        let read = brotli::Decompressor::new(&mut input, COMPRESSION_BUFFER_SIZE)
            .take(self.max_payload as u64 + 1)
            .read_to_end(&mut payload);
        if let Err(e) = read {
            // The decoder asked for more input after the last byte: the stream was cut.
            if input.exhausted {
                return Err(Error::Truncated {
                    version,
                    expected: packed_len(version),
                    actual: payload.len(),
                });
            }
            return Err(Error::invalid_state(format!("invalid compressed payload: {}", e)));
        }
        if payload.len() > self.max_payload {
            return Err(Error::invalid_state(format!(
                "decompressed payload exceeds {} bytes",
                self.max_payload
            )));
        }
        Ok((version, payload))
    }

    /// Decode a blob of any supported version
    pub fn decode(&self, blob: &str) -> Result<DecodedDesign> {
        let result = self
            .unwrap_payload(blob)
            .and_then(|(version, payload)| VersionedPayload::parse(version, &payload));
        let parsed = match result {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Rejected design blob: {}", err);
                return Err(err);
            }
        };

        let version = parsed.version();
        let (current, legacy_write_protected) = parsed.into_current();
        if version != CURRENT_WIRE_VERSION {
            debug!("Migrated design blob from version {}", version);
        }
        let (record, mask) = current.into_design();
        Ok(DecodedDesign { record, mask, version, legacy_write_protected })
    }
}

/// Compressed input that remembers whether the decoder read past its end
struct StreamInput<'a> {
    data: &'a [u8],
    exhausted: bool,
}

impl Read for StreamInput<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.exhausted = true;
        }
        Ok(n)
    }
}
