#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::{Rgb, RgbImage};
use lefocus_timeline_lib::backend::{BackendError, TextBackend};
use lefocus_timeline_lib::models::Screenshot;

/// 2024-01-01 12:00:00 UTC
pub const NOON: i64 = 1_704_110_400;
/// 2024-01-01 10:00:00 UTC
pub const TEN_AM: i64 = NOON - 2 * 3600;

/// In-memory backend replaying canned replies in order.
pub struct ScriptedBackend {
    caption: Result<String, BackendError>,
    text: Mutex<VecDeque<Result<String, BackendError>>>,
    structured: Mutex<VecDeque<Result<String, BackendError>>>,
    pub caption_calls: AtomicUsize,
    pub structured_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(caption: &str) -> Self {
        Self {
            caption: Ok(caption.to_string()),
            text: Mutex::new(VecDeque::new()),
            structured: Mutex::new(VecDeque::new()),
            caption_calls: AtomicUsize::new(0),
            structured_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_captions() -> Self {
        Self {
            caption: Err(BackendError::Transport("connection refused".into())),
            ..Self::new("")
        }
    }

    pub fn text_reply(self, reply: &str) -> Self {
        self.text.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    pub fn structured_reply(self, reply: &str) -> Self {
        self.structured.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    pub fn structured_error(self, err: BackendError) -> Self {
        self.structured.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn captions(&self) -> usize {
        self.caption_calls.load(Ordering::SeqCst)
    }

    pub fn structured(&self) -> usize {
        self.structured_calls.load(Ordering::SeqCst)
    }
}

impl TextBackend for ScriptedBackend {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn describe_frame(&self, image: &[u8]) -> Result<String, BackendError> {
        assert!(image.starts_with(&[0xFF, 0xD8]), "frames are sent as JPEG");
        self.caption_calls.fetch_add(1, Ordering::SeqCst);
        self.caption.clone()
    }

    async fn generate_structured(&self, _prompt: &str) -> Result<String, BackendError> {
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        self.structured
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BackendError::EmptyResponse))
    }

    async fn generate_text(&self, _prompt: &str) -> Result<String, BackendError> {
        self.text
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BackendError::EmptyResponse))
    }
}

/// Write one small PNG per timestamp into `dir`.
pub fn write_frames(dir: &Path, times: &[i64]) -> Vec<Screenshot> {
    times
        .iter()
        .enumerate()
        .map(|(i, ts)| {
            let path = dir.join(format!("{ts}.png"));
            RgbImage::from_pixel(64, 48, Rgb([(i * 10 % 255) as u8, 80, 160]))
                .save(&path)
                .unwrap();
            Screenshot::new(*ts, path)
        })
        .collect()
}

pub fn categories() -> Vec<String> {
    vec!["Coding".into(), "Meetings".into(), "Browsing".into()]
}
