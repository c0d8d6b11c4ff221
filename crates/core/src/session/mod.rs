use crate::{
    audio::{AudioTimeline, OutputClock, Renderer},
    config::{AppConfig, EngineConfig},
    gesture::SpeedController,
    logging::ComponentLogger,
    timeline::{DriftCorrection, DriftMonitor, PlaybackClock, SessionAction},
    Result, ScrubError,
};

/// Snapshot returned by [`ScrubSession::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub reference_time: f64,
    pub audio_time: f64,
    pub speed: f64,
    pub correction: Option<DriftCorrection>,
}

/// Drives an [`AudioTimeline`] the way the interactive animation does: a
/// reference clock advanced at the scrub speed, gestures that change the
/// speed, and periodic drift correction of the audio against that clock.
#[derive(Debug)]
pub struct ScrubSession<C: OutputClock> {
    audio: AudioTimeline<C>,
    engine: EngineConfig,
    clock: PlaybackClock,
    controller: SpeedController,
    drift: DriftMonitor,
    speed: f64,
    started: bool,
    playing: bool,
    muted: bool,
    log: ComponentLogger,
}

impl<C: OutputClock> ScrubSession<C> {
    pub fn new(audio: AudioTimeline<C>, config: &AppConfig) -> Self {
        let mut log = ComponentLogger::new("ScrubSession");
        if let Some(verbose) = config.verbose_logging {
            log.set_verbose(verbose);
        }

        Self {
            audio,
            engine: config.engine.clone(),
            clock: PlaybackClock::default(),
            controller: SpeedController::new(config.driver.clone()),
            drift: DriftMonitor::from_config(&config.driver),
            speed: 1.0,
            started: false,
            playing: false,
            muted: false,
            log,
        }
    }

    pub fn audio(&self) -> &AudioTimeline<C> {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioTimeline<C> {
        &mut self.audio
    }

    pub fn reference_time(&self) -> f64 {
        self.clock.time_seconds
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Starts the experience from the top. Only the first call has an effect.
    pub fn start(&mut self, now: f64) -> Result<()> {
        if !self.audio.is_loaded() {
            return Err(ScrubError::InvalidInput("session started before audio was loaded"));
        }
        if self.started || self.playing {
            return Ok(());
        }

        self.started = true;
        self.playing = true;
        self.clock = PlaybackClock::with_limit(self.audio.duration());
        self.audio.play(Some(0.0));
        self.drift.reset(now);
        self.log.info("session started");
        Ok(())
    }

    pub fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.set_speed(1.0);
        self.controller.cancel();
        self.audio.pause();
        self.playing = false;
    }

    pub fn resume(&mut self, now: f64) {
        if !self.started || self.playing {
            return;
        }
        self.playing = true;
        self.audio.play(Some(self.clock.time_seconds));
        self.drift.reset(now);
    }

    /// Clamps and applies a signed speed. Ignored while paused.
    ///
    /// A zero speed freezes the reference clock; the audio keeps its
    /// direction and crawls at the minimum speed.
    pub fn set_speed(&mut self, speed: f64) {
        if !self.playing {
            return;
        }
        let speed = self.engine.clamp_speed(speed);
        self.speed = speed;
        self.audio.set_playback_rate(speed);
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.audio.set_volume(if self.muted { 0.0 } else { 1.0 });
    }

    pub fn press(&mut self, y: f64) {
        self.controller.press(y);
    }

    pub fn drag(&mut self, y: f64) {
        if let Some(speed) = self.controller.drag(y) {
            self.set_speed(speed);
        }
    }

    pub fn release(&mut self, now: f64) {
        if self.playing && self.controller.release(now, self.speed) {
            self.log
                .info(format_args!("released, current speed: {:.2}", self.speed));
        }
    }

    pub fn wheel(&mut self, delta_y: f64, now: f64) {
        let speed = self.controller.wheel(delta_y, now);
        self.set_speed(speed);
    }

    /// Applies one scripted action at time `now`.
    pub fn apply(&mut self, action: &SessionAction, now: f64) -> Result<()> {
        match *action {
            SessionAction::Start => self.start(now)?,
            SessionAction::Pause => self.pause(),
            SessionAction::Resume => self.resume(now),
            SessionAction::Seek { position } => {
                self.clock.time_seconds = position.clamp(0.0, self.audio.duration());
                self.audio.seek(position);
            }
            SessionAction::Speed { speed } => self.set_speed(speed),
            SessionAction::Press { y } => self.press(y),
            SessionAction::Drag { y } => self.drag(y),
            SessionAction::Release => self.release(now),
            SessionAction::Wheel { delta_y } => self.wheel(delta_y, now),
            SessionAction::ToggleMute => self.toggle_mute(),
            SessionAction::Cutoff { hz } => self.audio.set_filter_cutoff(hz),
            SessionAction::Distortion { amount } => self.audio.set_distortion(amount),
        }
        Ok(())
    }

    /// Advances the session by `delta` seconds ending at `now`: applies any
    /// ramp or debounce output, moves the reference clock at the current
    /// speed and runs the drift check.
    pub fn tick(&mut self, now: f64, delta: f64) -> TickReport {
        let update = self.controller.update(now, self.speed);
        if let Some(speed) = update.speed {
            self.set_speed(speed);
        }
        if let Some(volume) = update.volume {
            if !self.muted {
                self.audio.set_volume(volume);
            }
        }

        let mut correction = None;
        if self.playing {
            self.clock.advance(delta, self.speed);
            correction = self
                .drift
                .poll(now, self.clock.time_seconds, &mut self.audio);
            if let Some(c) = correction {
                self.log
                    .info(format_args!("drift detected: {:.3}s", c.drift));
            }
        }

        TickReport {
            reference_time: self.clock.time_seconds,
            audio_time: self.audio.current_time(),
            speed: self.speed,
            correction,
        }
    }

    /// Renders one interleaved output block.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        self.audio.render(output, channels);
    }
}

impl<C: OutputClock> Renderer for ScrubSession<C> {
    fn render(&mut self, output: &mut [f32], channels: usize) {
        ScrubSession::render(self, output, channels);
    }
}
