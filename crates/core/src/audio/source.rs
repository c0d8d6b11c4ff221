use std::sync::Arc;

use super::SampleBuffer;

/// One-shot playback handle reading a single buffer from a fixed offset.
///
/// A source is never restarted: the engine drops it and builds a new one
/// whenever the read position jumps or the buffer changes.
#[derive(Debug)]
pub struct ActiveSource {
    buffer: Arc<SampleBuffer>,
    start_offset: f64,
    /// Read head in source frames; fractional while resampling.
    position: f64,
    speed: f64,
    /// Source frames consumed per output frame at unit speed.
    step: f64,
    stopped: bool,
}

impl ActiveSource {
    /// Starts reading `buffer` at `offset` seconds.
    pub fn start(
        buffer: Arc<SampleBuffer>,
        offset: f64,
        speed: f64,
        output_sample_rate: u32,
    ) -> Self {
        let offset = offset.clamp(0.0, buffer.duration());
        let position = offset * buffer.sample_rate() as f64;
        let step = buffer.sample_rate() as f64 / output_sample_rate.max(1) as f64;

        Self {
            buffer,
            start_offset: offset,
            position,
            speed,
            step,
            stopped: false,
        }
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// Offset, in seconds into [`Self::buffer`], the source started from.
    pub fn start_offset(&self) -> f64 {
        self.start_offset
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// True once stopped or once the read head has passed the last frame.
    pub fn is_finished(&self) -> bool {
        self.stopped || self.position >= self.buffer.frames() as f64
    }

    /// Writes interleaved samples into `output`, overwriting it. Frames past
    /// the end of the buffer are left silent.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        if self.is_finished() {
            output.fill(0.0);
            return;
        }

        let frames = self.buffer.frames();
        let src_channels = self.buffer.channel_count();
        let increment = self.step * self.speed;

        for frame in output.chunks_mut(channels) {
            let index = self.position.floor() as usize;
            if index >= frames {
                frame.fill(0.0);
                continue;
            }
            let next = (index + 1).min(frames - 1);
            let fraction = (self.position - index as f64) as f32;

            for (ch, sample) in frame.iter_mut().enumerate() {
                let plane = self.buffer.channel(ch % src_channels);
                *sample = plane[index] + (plane[next] - plane[index]) * fraction;
            }

            self.position += increment;
        }
    }
}
