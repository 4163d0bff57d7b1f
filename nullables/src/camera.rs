//! Nullable camera: frames from a queue.

use biopay_wallet_core::face::{FaceSample, FrameSource};
use biopay_wallet_core::WalletError;
use std::collections::VecDeque;

/// Frame used when nothing else is queued.
pub const DEFAULT_FRAME: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRgABAQ==";

/// A camera that returns queued frames, then [`DEFAULT_FRAME`] forever.
#[derive(Default)]
pub struct NullCamera {
    queued: VecDeque<Result<FaceSample, String>>,
    captured: usize,
}

impl NullCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self, frame: impl Into<String>) {
        self.queued.push_back(Ok(FaceSample::new(frame)));
    }

    /// Queue a capture failure such as a denied permission.
    pub fn push_error(&mut self, reason: impl Into<String>) {
        self.queued.push_back(Err(reason.into()));
    }

    pub fn captured(&self) -> usize {
        self.captured
    }
}

impl FrameSource for NullCamera {
    fn capture_frame(&mut self) -> Result<FaceSample, WalletError> {
        self.captured += 1;
        match self.queued.pop_front() {
            Some(Ok(sample)) => Ok(sample),
            Some(Err(reason)) => Err(WalletError::Capture(reason)),
            None => Ok(FaceSample::new(DEFAULT_FRAME)),
        }
    }
}
