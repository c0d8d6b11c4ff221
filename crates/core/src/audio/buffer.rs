use std::sync::Arc;

use crate::{Result, ScrubError};

/// Playback direction, derived from the sign of the playback rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackDirection {
    #[default]
    Forward,
    Reverse,
}

impl PlaybackDirection {
    /// Direction encoded by a signed rate. Zero yields `None` so callers can
    /// keep whatever direction they already had.
    pub fn from_rate(rate: f64) -> Option<Self> {
        if rate > 0.0 {
            Some(Self::Forward)
        } else if rate < 0.0 {
            Some(Self::Reverse)
        } else {
            None
        }
    }

    pub fn signum(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Reverse => -1.0,
        }
    }
}

/// Decoded PCM data stored as one plane per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() {
            return Err(ScrubError::InvalidInput("audio needs at least one channel"));
        }
        if sample_rate == 0 {
            return Err(ScrubError::InvalidInput("sample rate must be positive"));
        }
        let frames = channels[0].len();
        if channels.iter().any(|plane| plane.len() != frames) {
            return Err(ScrubError::InvalidInput(
                "all channels must hold the same number of frames",
            ));
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples in each channel.
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Returns a copy with every channel in reverse sample order.
    pub fn reversed(&self) -> Self {
        let channels = self
            .channels
            .iter()
            .map(|plane| plane.iter().rev().copied().collect())
            .collect();

        Self {
            channels,
            sample_rate: self.sample_rate,
        }
    }
}

/// One audio file, decoded in natural order plus a time-inverted copy used
/// for backward playback.
#[derive(Debug)]
pub struct AudioAsset {
    forward: Arc<SampleBuffer>,
    reverse: Arc<SampleBuffer>,
}

impl AudioAsset {
    pub fn new(forward: SampleBuffer) -> Self {
        let reverse = forward.reversed();
        Self {
            forward: Arc::new(forward),
            reverse: Arc::new(reverse),
        }
    }

    pub fn forward(&self) -> &Arc<SampleBuffer> {
        &self.forward
    }

    pub fn reverse(&self) -> &Arc<SampleBuffer> {
        &self.reverse
    }

    pub fn buffer(&self, direction: PlaybackDirection) -> &Arc<SampleBuffer> {
        match direction {
            PlaybackDirection::Forward => &self.forward,
            PlaybackDirection::Reverse => &self.reverse,
        }
    }

    pub fn duration(&self) -> f64 {
        self.forward.duration()
    }

    pub fn channel_count(&self) -> usize {
        self.forward.channel_count()
    }

    pub fn sample_rate(&self) -> u32 {
        self.forward.sample_rate()
    }
}
