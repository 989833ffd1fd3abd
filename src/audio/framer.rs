//! Inbound audio frame normalization.
//!
//! The device is required to send 16-bit little-endian mono PCM at 16kHz;
//! the server does no resampling. The framer only normalizes the framing:
//! base64 strings are decoded, byte payloads pass through, and empty or
//! oversize frames are dropped.

use base64::Engine;
use serde::Deserialize;
use tracing::debug;

/// Audio payload as it appears on the wire: raw bytes or a base64 string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AudioData {
    Base64(String),
    Bytes(Vec<u8>),
}

/// Normalizes inbound frames to contiguous PCM chunks.
#[derive(Debug, Clone)]
pub struct AudioFramer {
    max_frame_bytes: usize,
}

impl AudioFramer {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    /// Normalize one inbound frame. Returns `None` when the frame is
    /// dropped (empty, oversize, or undecodable base64); drops are silent
    /// toward the client.
    pub fn normalize(&self, data: AudioData) -> Option<Vec<u8>> {
        let pcm = match data {
            AudioData::Bytes(bytes) => bytes,
            AudioData::Base64(text) => {
                if text.is_empty() {
                    return None;
                }
                match base64::engine::general_purpose::STANDARD.decode(text.as_bytes()) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        debug!("Dropping undecodable audio frame: {}", e);
                        return None;
                    }
                }
            }
        };

        if pcm.is_empty() {
            return None;
        }
        if pcm.len() > self.max_frame_bytes {
            debug!(
                "Dropping oversize audio frame: {} bytes (max {})",
                pcm.len(),
                self.max_frame_bytes
            );
            return None;
        }

        Some(pcm)
    }
}
