use std::sync::Arc;

use crate::{config::EngineConfig, logging::ComponentLogger, Result};

use super::{
    decode, fetch, ActiveSource, AudioAsset, EffectsChain, OutputClock, PlaybackDirection,
};

/// Seekable, variable-rate, reversible playback over one audio asset.
///
/// The engine keeps a virtual cursor (`buffer_offset`, anchored at
/// `start_time` on the output clock) expressed on the natural timeline of the
/// asset. Reverse playback reads a pre-reversed copy of the samples starting
/// at `duration - position`.
///
/// Operations that cannot be honoured (nothing loaded, nothing playing) are
/// logged as warnings and otherwise ignored.
#[derive(Debug)]
pub struct AudioTimeline<C: OutputClock> {
    config: EngineConfig,
    clock: C,
    asset: Option<Arc<AudioAsset>>,
    source: Option<ActiveSource>,
    effects: EffectsChain,
    direction: PlaybackDirection,
    /// Magnitude of the playback rate.
    speed: f64,
    buffer_offset: f64,
    start_time: f64,
    /// Scrub cutoff for a rate set while paused, applied on the next `play`.
    pending_cutoff: Option<f32>,
    is_playing: bool,
    closed: bool,
    log: ComponentLogger,
}

impl<C: OutputClock> AudioTimeline<C> {
    pub fn new(clock: C, config: EngineConfig) -> Self {
        let effects = EffectsChain::new(
            config.open_cutoff_hz,
            config.output_sample_rate,
            config.distortion_curve,
            config.curve_samples,
        );

        Self {
            config,
            clock,
            asset: None,
            source: None,
            effects,
            direction: PlaybackDirection::Forward,
            speed: 1.0,
            buffer_offset: 0.0,
            start_time: 0.0,
            pending_cutoff: None,
            is_playing: false,
            closed: false,
            log: ComponentLogger::new("AudioTimeline"),
        }
    }

    pub fn with_logger(mut self, log: ComponentLogger) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Fetches and decodes `url`, replacing any previously loaded asset.
    ///
    /// On failure nothing stays loaded and the error is returned.
    pub async fn load(&mut self, url: &str) -> Result<()> {
        self.unload();
        self.log.info(format_args!("loading audio from {url}"));

        let bytes = match fetch::fetch(url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.log.error(format_args!("failed to fetch {url}: {err}"));
                return Err(err);
            }
        };
        let hint = decode::extension_hint(url);
        self.load_bytes(bytes, hint.as_deref())
    }

    /// Decodes an in-memory payload and installs it.
    pub fn load_bytes(&mut self, bytes: Vec<u8>, extension: Option<&str>) -> Result<()> {
        self.unload();
        match decode::decode(bytes, extension) {
            Ok(buffer) => {
                self.load_asset(Arc::new(AudioAsset::new(buffer)));
                Ok(())
            }
            Err(err) => {
                self.log.error(format_args!("failed to decode audio: {err}"));
                Err(err)
            }
        }
    }

    /// Installs an already decoded asset. Playback restarts from the
    /// beginning, in the forward direction, stopped.
    pub fn load_asset(&mut self, asset: Arc<AudioAsset>) {
        self.unload();
        self.log.info(format_args!(
            "audio loaded: {:.2}s, {} channel(s) at {} Hz",
            asset.duration(),
            asset.channel_count(),
            asset.sample_rate()
        ));
        self.asset = Some(asset);
        self.closed = false;
    }

    fn unload(&mut self) {
        self.stop_source();
        self.asset = None;
        self.is_playing = false;
        self.buffer_offset = 0.0;
        self.direction = PlaybackDirection::Forward;
    }

    pub fn is_loaded(&self) -> bool {
        self.asset.is_some()
    }

    pub fn asset(&self) -> Option<&Arc<AudioAsset>> {
        self.asset.as_ref()
    }

    /// The playback handle currently feeding the output, if any.
    pub fn active_source(&self) -> Option<&ActiveSource> {
        self.source.as_ref()
    }

    /// Duration of the loaded asset, or zero when nothing is loaded.
    pub fn duration(&self) -> f64 {
        self.asset.as_ref().map(|a| a.duration()).unwrap_or(0.0)
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn playback_direction(&self) -> PlaybackDirection {
        self.direction
    }

    /// Signed playback rate; the sign encodes the direction.
    pub fn playback_rate(&self) -> f64 {
        self.speed * self.direction.signum()
    }

    /// Starts playback at `position` seconds, or at the current cursor.
    ///
    /// An explicit position at the end of the track (forward) or at its start
    /// (reverse) is refused so playback does not restart at a boundary.
    pub fn play(&mut self, position: Option<f64>) {
        let Some(duration) = self.loaded_duration() else {
            self.log.warn("play called before audio was loaded");
            return;
        };
        if let Some(position) = position {
            if !position.is_finite() {
                self.log.warn(format_args!("ignoring play at invalid position {position}"));
                return;
            }
            let at_boundary = match self.direction {
                PlaybackDirection::Forward => position >= duration,
                PlaybackDirection::Reverse => position <= 0.0,
            };
            if at_boundary {
                self.log
                    .debug(format_args!("refusing to play at track boundary {position:.3}s"));
                return;
            }
        }

        self.clock.resume();
        if let Some(cutoff) = self.pending_cutoff.take() {
            self.effects.filter.set_cutoff(cutoff);
        }
        self.stop_source();
        let offset = position.unwrap_or(self.buffer_offset).clamp(0.0, duration);
        self.start_source(offset);
        self.buffer_offset = offset;
        self.start_time = self.clock.now();
        self.is_playing = true;
        self.log.debug(format_args!(
            "playing from {offset:.3}s at rate {:.2}",
            self.playback_rate()
        ));
    }

    /// Pauses playback, keeping the cursor exactly where it was.
    pub fn pause(&mut self) {
        if !self.is_playing {
            self.log.warn("pause called while not playing");
            return;
        }

        self.buffer_offset = self.position_now();
        self.stop_source();
        self.clock.suspend();
        self.is_playing = false;
        self.log
            .debug(format_args!("paused at {:.3}s", self.buffer_offset));
    }

    /// Moves the cursor, restarting the source if playing.
    pub fn seek(&mut self, position: f64) {
        let Some(duration) = self.loaded_duration() else {
            self.log.warn("seek called before audio was loaded");
            return;
        };
        if !position.is_finite() {
            self.log.warn(format_args!("ignoring seek to invalid position {position}"));
            return;
        }

        let target = position.clamp(0.0, duration);
        if self.is_playing {
            self.stop_source();
            self.start_source(target);
            self.start_time = self.clock.now();
        }
        self.buffer_offset = target;
    }

    /// Sets a signed playback rate. The sign selects the direction (zero keeps
    /// the current one) and the magnitude is clamped to the configured range.
    ///
    /// A direction change swaps to the other sample buffer and restarts the
    /// source at the current position; a speed change alone is applied to the
    /// live source in place.
    pub fn set_playback_rate(&mut self, rate: f64) {
        if !self.is_loaded() {
            self.log.warn("set_playback_rate called before audio was loaded");
            return;
        }
        if !rate.is_finite() {
            self.log.warn(format_args!("ignoring invalid playback rate {rate}"));
            return;
        }

        let direction = PlaybackDirection::from_rate(rate).unwrap_or(self.direction);
        let speed = rate.abs().clamp(self.config.min_speed, self.config.max_speed);

        let cutoff = self.scrub_cutoff(speed);
        if !self.is_playing {
            self.direction = direction;
            self.speed = speed;
            self.pending_cutoff = Some(cutoff);
            return;
        }

        let position = self.position_now();
        self.pending_cutoff = None;
        self.effects.filter.set_cutoff(cutoff);

        let flipped = direction != self.direction;
        self.direction = direction;
        self.speed = speed;
        self.buffer_offset = position;
        self.start_time = self.clock.now();

        if flipped {
            self.stop_source();
            self.start_source(position);
        } else if let Some(source) = self.source.as_mut() {
            source.set_speed(speed);
        }
    }

    /// Current position in seconds on the natural timeline of the asset.
    pub fn current_time(&self) -> f64 {
        if self.is_playing {
            self.position_now()
        } else {
            self.buffer_offset
        }
    }

    pub fn volume(&self) -> f32 {
        self.effects.gain.value()
    }

    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_finite() {
            self.effects.gain.set_value(volume);
        }
    }

    pub fn filter_cutoff(&self) -> f32 {
        self.effects.filter.cutoff()
    }

    pub fn set_filter_cutoff(&mut self, hz: f32) {
        if hz.is_finite() {
            self.pending_cutoff = None;
            self.effects.filter.set_cutoff(hz);
        }
    }

    pub fn distortion(&self) -> f32 {
        self.effects.shaper.amount()
    }

    pub fn set_distortion(&mut self, amount: f32) {
        if amount.is_finite() {
            self.effects.shaper.set_amount(amount);
        }
    }

    /// Renders one interleaved block of output through the effects chain.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        match self.source.as_mut() {
            Some(source) => source.render(output, channels),
            None => output.fill(0.0),
        }
        self.effects.process(output, channels);
    }

    /// Releases the asset and the output graph. The engine behaves as
    /// unloaded afterwards until a new asset is loaded.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.unload();
        self.clock.suspend();
        self.closed = true;
        self.log.info("audio timeline closed");
    }

    fn loaded_duration(&self) -> Option<f64> {
        self.asset.as_ref().map(|a| a.duration())
    }

    /// Cursor position while playing, clamped to the track.
    fn position_now(&self) -> f64 {
        let elapsed = (self.clock.now() - self.start_time).max(0.0);
        let position = self.buffer_offset + elapsed * self.speed * self.direction.signum();
        position.clamp(0.0, self.duration())
    }

    /// Higher speeds close the low-pass filter to tame scrubbing artefacts.
    fn scrub_cutoff(&self, speed: f64) -> f32 {
        let open = self.config.open_cutoff_hz;
        if speed <= 1.0 {
            return open;
        }
        (open / speed as f32).max(self.config.min_scrub_cutoff_hz.min(open))
    }

    fn start_source(&mut self, position: f64) {
        let Some(asset) = self.asset.as_ref() else {
            return;
        };
        let duration = asset.duration();
        let read_offset = match self.direction {
            PlaybackDirection::Forward => position,
            PlaybackDirection::Reverse => duration - position,
        };
        self.source = Some(ActiveSource::start(
            Arc::clone(asset.buffer(self.direction)),
            read_offset,
            self.speed,
            self.config.output_sample_rate,
        ));
    }

    fn stop_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
    }
}

impl<C: OutputClock> Drop for AudioTimeline<C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::audio::{
        decode::tests::wav_bytes, fetch::tests::serve_once, ManualClock, SampleBuffer,
    };

    const RATE: u32 = 100;

    fn ramp_asset(seconds: usize) -> Arc<AudioAsset> {
        let plane = (0..seconds * RATE as usize).map(|i| i as f32 / 1000.0).collect();
        Arc::new(AudioAsset::new(SampleBuffer::new(vec![plane], RATE).unwrap()))
    }

    fn engine() -> (AudioTimeline<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let config = EngineConfig {
            output_sample_rate: RATE,
            ..EngineConfig::default()
        };
        let mut engine = AudioTimeline::new(clock.clone(), config);
        engine.load_asset(ramp_asset(10));
        (engine, clock)
    }

    #[test]
    fn forward_position_advances_with_rate() {
        let (mut engine, clock) = engine();
        engine.set_playback_rate(1.5);
        engine.play(Some(2.0));
        clock.advance(2.0);
        assert_relative_eq!(engine.current_time(), 5.0);

        clock.advance(10.0);
        assert_relative_eq!(engine.current_time(), 10.0);
        assert!(engine.is_playing());
    }

    #[test]
    fn reverse_position_clamps_at_zero() {
        let (mut engine, clock) = engine();
        engine.set_playback_rate(-2.0);
        engine.play(Some(4.0));
        clock.advance(1.5);
        assert_relative_eq!(engine.current_time(), 1.0);

        clock.advance(5.0);
        assert_eq!(engine.current_time(), 0.0);
    }

    #[test]
    fn pause_preserves_position() {
        let (mut engine, clock) = engine();
        engine.set_playback_rate(3.0);
        engine.play(Some(1.0));
        clock.advance(0.7);
        let before = engine.current_time();

        engine.pause();
        assert!(!engine.is_playing());
        assert_relative_eq!(engine.current_time(), before);
        assert_relative_eq!(engine.current_time(), 3.1, epsilon = 1e-9);
        assert!(engine.active_source().is_none());
        assert!(!engine.clock().is_running());
    }

    #[test]
    fn refuses_to_play_at_boundaries() {
        let (mut engine, _clock) = engine();
        engine.seek(4.0);
        engine.play(Some(10.0));
        assert!(!engine.is_playing());
        assert_eq!(engine.current_time(), 4.0);

        engine.set_playback_rate(-1.0);
        engine.play(Some(0.0));
        assert!(!engine.is_playing());
        assert_eq!(engine.current_time(), 4.0);
        assert!(engine.active_source().is_none());
    }

    #[test]
    fn direction_flip_reads_reverse_buffer() {
        let (mut engine, clock) = engine();
        engine.play(Some(0.0));
        clock.advance(4.0);
        engine.set_playback_rate(-1.0);

        let asset = Arc::clone(engine.asset().unwrap());
        let source = engine.active_source().unwrap();
        assert!(Arc::ptr_eq(source.buffer(), asset.reverse()));
        assert_relative_eq!(source.start_offset(), 6.0);
        assert_eq!(engine.playback_direction(), PlaybackDirection::Reverse);
        assert_relative_eq!(engine.current_time(), 4.0);
    }

    #[test]
    fn same_direction_rate_change_keeps_source() {
        let (mut engine, clock) = engine();
        engine.play(Some(1.0));
        clock.advance(1.0);
        engine.set_playback_rate(4.0);

        let source = engine.active_source().unwrap();
        assert_relative_eq!(source.start_offset(), 1.0);
        assert_eq!(source.speed(), 4.0);
        assert!(engine.filter_cutoff() < engine.config().open_cutoff_hz);

        engine.set_playback_rate(0.5);
        assert_eq!(engine.filter_cutoff(), engine.config().open_cutoff_hz);
    }

    #[test]
    fn paused_rate_change_updates_cutoff_on_play() {
        let (mut engine, clock) = engine();
        engine.play(Some(1.0));
        engine.set_playback_rate(30.0);
        assert_eq!(engine.filter_cutoff(), engine.config().min_scrub_cutoff_hz);

        clock.advance(0.1);
        engine.pause();
        engine.set_playback_rate(1.0);
        assert_eq!(engine.filter_cutoff(), engine.config().min_scrub_cutoff_hz);

        engine.play(None);
        assert_eq!(engine.filter_cutoff(), engine.config().open_cutoff_hz);
    }

    #[test]
    fn manual_cutoff_overrides_paused_rate_change() {
        let (mut engine, _clock) = engine();
        engine.set_playback_rate(10.0);
        engine.set_filter_cutoff(1_500.0);
        engine.play(Some(0.0));
        assert_eq!(engine.filter_cutoff(), 1_500.0);
    }

    #[test]
    fn rate_is_recorded_while_paused_and_clamped() {
        let (mut engine, _clock) = engine();
        engine.set_playback_rate(-100.0);
        assert_eq!(engine.playback_rate(), -30.0);
        assert!(!engine.is_playing());

        engine.set_playback_rate(0.0);
        assert_eq!(engine.playback_rate(), -0.1);
    }

    #[test]
    fn operations_before_load_are_ignored() {
        let clock = ManualClock::new();
        let mut engine = AudioTimeline::new(clock, EngineConfig::default());

        engine.play(Some(1.0));
        engine.play(None);
        engine.seek(3.0);
        engine.set_playback_rate(-2.0);
        engine.pause();

        assert!(!engine.is_playing());
        assert_eq!(engine.current_time(), 0.0);
        assert_eq!(engine.playback_rate(), 1.0);
        assert_eq!(engine.duration(), 0.0);
    }

    #[test]
    fn seek_while_paused_only_moves_cursor() {
        let (mut engine, _clock) = engine();
        engine.seek(42.0);
        assert_eq!(engine.current_time(), 10.0);
        assert!(engine.active_source().is_none());

        engine.seek(-1.0);
        assert_eq!(engine.current_time(), 0.0);
    }

    #[test]
    fn seek_while_playing_reanchors() {
        let (mut engine, clock) = engine();
        engine.play(Some(0.0));
        clock.advance(2.0);
        engine.seek(7.0);
        assert_relative_eq!(engine.active_source().unwrap().start_offset(), 7.0);
        clock.advance(1.0);
        assert_relative_eq!(engine.current_time(), 8.0);
    }

    #[test]
    fn scripted_scrub_scenario() {
        let (mut engine, clock) = engine();
        assert_eq!(engine.duration(), 10.0);

        engine.play(Some(0.0));
        clock.advance(3.0);
        assert_relative_eq!(engine.current_time(), 3.0);

        engine.set_playback_rate(-2.0);
        clock.advance(1.0);
        assert_relative_eq!(engine.current_time(), 1.0);

        engine.pause();
        assert_relative_eq!(engine.current_time(), 1.0);
    }

    #[test]
    fn renders_forward_and_reverse_samples() {
        let (mut engine, clock) = engine();
        let mut block = [0.0f32; 3];

        engine.play(Some(1.0));
        engine.render(&mut block, 1);
        assert_relative_eq!(block[0], 0.100);
        assert_relative_eq!(block[2], 0.102);

        // Reverse frame k holds forward frame n - 1 - k, so reading back from
        // 1.03s starts one frame earlier in the forward data.
        clock.advance(0.03);
        engine.set_playback_rate(-1.0);
        engine.render(&mut block, 1);
        assert_relative_eq!(block[0], 0.102, epsilon = 1e-6);
        assert_relative_eq!(block[1], 0.101, epsilon = 1e-6);

        engine.set_volume(0.5);
        engine.render(&mut block, 1);
        assert_relative_eq!(block[0], 0.0495, epsilon = 1e-6);
    }

    #[test]
    fn close_releases_everything() {
        let (mut engine, clock) = engine();
        engine.play(Some(0.0));
        engine.close();

        assert!(!engine.is_loaded());
        assert!(!engine.is_playing());
        assert!(!clock.is_running());
        engine.play(Some(1.0));
        assert!(!engine.is_playing());
    }

    #[test]
    fn effect_accessors_round_trip() {
        let (mut engine, _clock) = engine();
        assert_eq!(engine.volume(), 1.0);
        assert_eq!(engine.filter_cutoff(), 20_000.0);
        assert_eq!(engine.distortion(), 0.0);

        engine.set_volume(0.25);
        engine.set_filter_cutoff(1_200.0);
        engine.set_distortion(20.0);
        engine.set_volume(f32::NAN);
        assert_eq!(engine.volume(), 0.25);
        assert_eq!(engine.filter_cutoff(), 1_200.0);
        assert_eq!(engine.distortion(), 20.0);
    }

    #[tokio::test]
    async fn loads_wav_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.wav");
        std::fs::write(&path, wav_bytes(2, 8_000, 16_000)).unwrap();

        let mut engine = AudioTimeline::new(ManualClock::new(), EngineConfig::default());
        engine.load(path.to_str().unwrap()).await.unwrap();

        assert!(engine.is_loaded());
        assert_relative_eq!(engine.duration(), 2.0);
        assert_eq!(engine.playback_direction(), PlaybackDirection::Forward);
    }

    #[tokio::test]
    async fn loads_wav_over_http() {
        let base = serve_once("200 OK", wav_bytes(1, 8_000, 4_000)).await;

        let mut engine = AudioTimeline::new(ManualClock::new(), EngineConfig::default());
        engine.load(&format!("{base}/audio/tone.wav")).await.unwrap();

        assert!(engine.is_loaded());
        assert_relative_eq!(engine.duration(), 0.5);
        assert_eq!(engine.asset().unwrap().channel_count(), 1);
    }

    #[tokio::test]
    async fn http_error_leaves_engine_unloaded() {
        let base = serve_once("404 Not Found", Vec::new()).await;

        let (mut engine, _clock) = engine();
        let err = engine.load(&format!("{base}/audio/tone.wav")).await.unwrap_err();
        assert!(matches!(err, crate::ScrubError::HttpStatus { status: 404, .. }));
        assert!(!engine.is_loaded());
    }

    #[tokio::test]
    async fn failed_load_leaves_engine_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("broken.mp3");
        std::fs::write(&garbage, b"not audio at all").unwrap();

        let (mut engine, _clock) = engine();
        engine.play(Some(0.0));
        assert!(engine.load(garbage.to_str().unwrap()).await.is_err());
        assert!(!engine.is_loaded());
        assert!(!engine.is_playing());

        let missing = dir.path().join("missing.wav");
        assert!(engine.load(missing.to_str().unwrap()).await.is_err());
        engine.play(Some(0.0));
        assert!(!engine.is_playing());
    }
}
