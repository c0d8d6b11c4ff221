//! Gesture-driven speed control: drags and wheel ticks set a scrub speed,
//! and letting go eases the speed (and volume) back to normal.

use crate::config::DriverConfig;

/// `power1.out` easing: fast start, gentle landing.
pub fn ease_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Eased interpolation between two values over a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    from: f64,
    to: f64,
    start: f64,
    duration: f64,
}

impl Tween {
    pub fn new(from: f64, to: f64, start: f64, duration: f64) -> Self {
        Self {
            from,
            to,
            start,
            duration,
        }
    }

    pub fn progress(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start) / self.duration).clamp(0.0, 1.0)
    }

    pub fn value_at(&self, now: f64) -> f64 {
        self.from + (self.to - self.from) * ease_out_quad(self.progress(now))
    }

    pub fn is_finished(&self, now: f64) -> bool {
        self.progress(now) >= 1.0
    }
}

/// Values the driver should apply after [`SpeedController::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeedUpdate {
    pub speed: Option<f64>,
    pub volume: Option<f32>,
}

/// Turns pointer drags and wheel ticks into playback speeds.
///
/// Speeds returned here are raw; the driver clamps them before they reach
/// the audio engine.
#[derive(Debug, Clone)]
pub struct SpeedController {
    config: DriverConfig,
    dragging: bool,
    last_y: f64,
    speed_ramp: Option<Tween>,
    volume_ramp: Option<Tween>,
    wheel_deadline: Option<f64>,
}

impl SpeedController {
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            dragging: false,
            last_y: 0.0,
            speed_ramp: None,
            volume_ramp: None,
            wheel_deadline: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn is_ramping(&self) -> bool {
        self.speed_ramp.is_some()
    }

    pub fn has_pending_wheel(&self) -> bool {
        self.wheel_deadline.is_some()
    }

    /// Pointer down: cancels any ramp or pending wheel release.
    pub fn press(&mut self, y: f64) {
        self.cancel();
        self.last_y = y;
        self.dragging = true;
    }

    /// Pointer moved to `y`. Dragging up scrubs forward, down scrubs back.
    pub fn drag(&mut self, y: f64) -> Option<f64> {
        if !self.dragging {
            return None;
        }
        let delta = y - self.last_y;
        self.last_y = y;
        Some(-delta / self.config.drag_ratio)
    }

    /// Pointer up. Starts easing from `current_speed` back to normal.
    pub fn release(&mut self, now: f64, current_speed: f64) -> bool {
        if !self.dragging {
            return false;
        }
        self.dragging = false;
        self.start_ramp(now, current_speed);
        true
    }

    /// A wheel tick. The ramp back to normal starts once no tick has arrived
    /// for the debounce period.
    pub fn wheel(&mut self, delta_y: f64, now: f64) -> f64 {
        self.cancel();
        self.wheel_deadline = Some(now + self.config.wheel_debounce);
        delta_y / self.config.wheel_ratio
    }

    /// Advances timers and ramps to `now`.
    pub fn update(&mut self, now: f64, current_speed: f64) -> SpeedUpdate {
        if let Some(deadline) = self.wheel_deadline {
            if now >= deadline {
                self.wheel_deadline = None;
                self.start_ramp(deadline, current_speed);
            }
        }

        let mut update = SpeedUpdate::default();
        if let Some(ramp) = self.speed_ramp {
            update.speed = Some(ramp.value_at(now));
            if ramp.is_finished(now) {
                self.speed_ramp = None;
            }
        }
        if let Some(ramp) = self.volume_ramp {
            update.volume = Some(ramp.value_at(now) as f32);
            if ramp.is_finished(now) {
                self.volume_ramp = None;
            }
        }
        update
    }

    pub fn cancel(&mut self) {
        self.speed_ramp = None;
        self.volume_ramp = None;
        self.wheel_deadline = None;
    }

    fn start_ramp(&mut self, now: f64, from_speed: f64) {
        let duration = self.config.ramp_duration;
        self.speed_ramp = Some(Tween::new(from_speed, 1.0, now, duration));
        self.volume_ramp = Some(Tween::new(
            self.config.ramp_volume_floor as f64,
            1.0,
            now,
            duration,
        ));
    }
}
