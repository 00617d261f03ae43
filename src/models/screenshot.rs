use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A raw capture owned by the capture subsystem. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    /// Epoch seconds.
    pub captured_at: i64,
    pub file_path: PathBuf,
}

impl Screenshot {
    pub fn new(captured_at: i64, file_path: impl Into<PathBuf>) -> Self {
        Self {
            captured_at,
            file_path: file_path.into(),
        }
    }
}

/// A downscaled, re-encoded frame ready to be captioned.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Seconds from batch start.
    pub timestamp_offset: i64,
    pub image_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDescription {
    pub timestamp_offset: i64,
    pub text: String,
}
