//! Real-time output: a device callback that pulls blocks from a shared
//! renderer and drives a [`FrameClock`] with the frames it produced.

use std::sync::Mutex;

use super::{AudioTimeline, FrameClock, OutputClock};

/// Anything that can fill interleaved output blocks.
pub trait Renderer: Send {
    fn render(&mut self, output: &mut [f32], channels: usize);
}

impl<C: OutputClock> Renderer for AudioTimeline<C> {
    fn render(&mut self, output: &mut [f32], channels: usize) {
        AudioTimeline::render(self, output, channels);
    }
}

/// Fills one device block from `source` and counts the rendered frames on
/// `clock`. A poisoned renderer produces silence and leaves the clock alone.
pub fn pull_block<R: Renderer + ?Sized>(
    source: &Mutex<R>,
    clock: &FrameClock,
    output: &mut [f32],
    channels: usize,
) {
    let channels = channels.max(1);
    match source.lock() {
        Ok(mut source) => {
            source.render(output, channels);
            clock.advance_frames(output.len() / channels);
        }
        Err(_) => output.fill(0.0),
    }
}

#[cfg(feature = "playback")]
pub use device::{DeviceOutput, OutputStream};

#[cfg(feature = "playback")]
mod device {
    use std::sync::{Arc, Mutex};

    use cpal::{
        traits::{DeviceTrait, HostTrait, StreamTrait},
        FromSample, SizedSample,
    };

    use super::{pull_block, Renderer};
    use crate::{audio::FrameClock, Result, ScrubError};

    fn output_error(err: impl std::fmt::Display) -> ScrubError {
        ScrubError::Output(err.to_string())
    }

    /// The host's default output device and its preferred stream format.
    pub struct DeviceOutput {
        device: cpal::Device,
        config: cpal::SupportedStreamConfig,
    }

    impl DeviceOutput {
        pub fn open_default() -> Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| ScrubError::Output("no audio output device available".into()))?;
            let config = device.default_output_config().map_err(output_error)?;
            Ok(Self { device, config })
        }

        /// Sample rate the engine must render at for this device.
        pub fn sample_rate(&self) -> u32 {
            self.config.sample_rate().0
        }

        pub fn channels(&self) -> usize {
            self.config.channels() as usize
        }

        /// Starts a stream whose callback renders from `source` and advances
        /// `clock` by every block it hands to the device.
        pub fn start<R: Renderer + 'static>(
            self,
            source: Arc<Mutex<R>>,
            clock: FrameClock,
        ) -> Result<OutputStream> {
            let sample_rate = self.sample_rate();
            let channels = self.channels();
            let format = self.config.sample_format();
            let config: cpal::StreamConfig = self.config.into();

            let stream = match format {
                cpal::SampleFormat::F32 => {
                    build_stream::<f32, R>(&self.device, &config, source, clock)?
                }
                cpal::SampleFormat::I16 => {
                    build_stream::<i16, R>(&self.device, &config, source, clock)?
                }
                cpal::SampleFormat::U16 => {
                    build_stream::<u16, R>(&self.device, &config, source, clock)?
                }
                other => {
                    return Err(ScrubError::Output(format!(
                        "unsupported sample format: {other:?}"
                    )))
                }
            };
            stream.play().map_err(output_error)?;

            tracing::info!(sample_rate, channels, "audio stream started");
            Ok(OutputStream {
                _stream: stream,
                sample_rate,
                channels,
            })
        }
    }

    /// A running device stream. Dropping it stops the output.
    pub struct OutputStream {
        _stream: cpal::Stream,
        sample_rate: u32,
        channels: usize,
    }

    impl OutputStream {
        pub fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        pub fn channels(&self) -> usize {
            self.channels
        }
    }

    fn build_stream<T, R>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        source: Arc<Mutex<R>>,
        clock: FrameClock,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
        R: Renderer + 'static,
    {
        let channels = config.channels as usize;
        let mut scratch: Vec<f32> = vec![0.0; 4096];

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if scratch.len() < data.len() {
                        scratch.resize(data.len(), 0.0);
                    }
                    let block = &mut scratch[..data.len()];
                    pull_block(&source, &clock, block, channels);
                    for (out, sample) in data.iter_mut().zip(block.iter()) {
                        *out = T::from_sample(*sample);
                    }
                },
                |err| tracing::error!("audio stream error: {err}"),
                None,
            )
            .map_err(output_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        audio::{AudioAsset, SampleBuffer},
        config::{AppConfig, EngineConfig},
        session::ScrubSession,
    };

    const RATE: u32 = 100;

    fn shared_engine() -> (Arc<Mutex<AudioTimeline<FrameClock>>>, FrameClock) {
        let clock = FrameClock::new(RATE);
        let config = EngineConfig {
            output_sample_rate: RATE,
            ..EngineConfig::default()
        };
        let plane = (0..4 * RATE as usize).map(|i| i as f32 / 1000.0).collect();
        let asset = AudioAsset::new(SampleBuffer::new(vec![plane], RATE).unwrap());

        let mut engine = AudioTimeline::new(clock.clone(), config);
        engine.load_asset(Arc::new(asset));
        (Arc::new(Mutex::new(engine)), clock)
    }

    #[test]
    fn rendered_frames_drive_engine_time() {
        let (engine, clock) = shared_engine();
        engine.lock().unwrap().play(Some(1.0));

        let mut block = vec![0.0f32; 50 * 2];
        pull_block(&engine, &clock, &mut block, 2);
        assert_eq!(clock.frames(), 50);
        assert_relative_eq!(block[0], 0.1);
        assert_relative_eq!(block[1], 0.1);

        pull_block(&engine, &clock, &mut block, 2);
        assert_relative_eq!(block[0], 0.15);
        assert_relative_eq!(engine.lock().unwrap().current_time(), 2.0);
    }

    #[test]
    fn paused_engine_holds_the_clock() {
        let (engine, clock) = shared_engine();
        engine.lock().unwrap().play(Some(0.0));

        let mut block = vec![0.0f32; 25];
        pull_block(&engine, &clock, &mut block, 1);
        engine.lock().unwrap().pause();
        pull_block(&engine, &clock, &mut block, 1);

        assert_eq!(clock.frames(), 25);
        assert!(block.iter().all(|s| *s == 0.0));
        assert_relative_eq!(engine.lock().unwrap().current_time(), 0.25);
    }

    #[test]
    fn session_audio_follows_device_frames() {
        let (engine, clock) = shared_engine();
        let audio = Arc::try_unwrap(engine).unwrap().into_inner().unwrap();
        let session = Mutex::new(ScrubSession::new(audio, &AppConfig::default()));
        session.lock().unwrap().start(0.0).unwrap();

        let mut block = vec![0.0f32; 20];
        for _ in 0..5 {
            pull_block(&session, &clock, &mut block, 1);
        }

        let report = session.lock().unwrap().tick(1.0, 1.0);
        assert_relative_eq!(report.audio_time, 1.0);
        assert_relative_eq!(report.reference_time, 1.0);
        assert!(report.correction.is_none());
    }

    #[test]
    fn poisoned_renderer_outputs_silence() {
        let (engine, clock) = shared_engine();
        engine.lock().unwrap().play(Some(0.0));

        let poisoned = Arc::clone(&engine);
        let _ = std::thread::spawn(move || {
            let _guard = poisoned.lock().unwrap();
            panic!("renderer crashed");
        })
        .join();

        let mut block = vec![1.0f32; 16];
        pull_block(&engine, &clock, &mut block, 2);
        assert!(block.iter().all(|s| *s == 0.0));
        assert_eq!(clock.frames(), 0);
    }
}
