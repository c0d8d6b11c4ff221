use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{
    audio::{AudioTimeline, OutputClock},
    config::DriverConfig,
};

/// Elapsed time of the driving animation, independent of the audio clock.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f64,
    /// Upper bound, usually the length of the animation.
    pub limit: Option<f64>,
}

impl PlaybackClock {
    pub fn with_limit(limit: f64) -> Self {
        Self {
            time_seconds: 0.0,
            limit: Some(limit),
        }
    }

    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    /// Advances by `delta` seconds scaled by a signed `speed`.
    pub fn advance(&mut self, delta: f64, speed: f64) {
        let next = (self.time_seconds + delta * speed).max(0.0);
        self.time_seconds = match self.limit {
            Some(limit) => next.min(limit),
            None => next,
        };
    }
}

/// Something whose position can be checked and hard-reset against a
/// reference clock.
pub trait Resync {
    fn current_time(&self) -> f64;
    fn resync_to(&mut self, seconds: f64);
}

impl<C: OutputClock> Resync for AudioTimeline<C> {
    fn current_time(&self) -> f64 {
        AudioTimeline::current_time(self)
    }

    fn resync_to(&mut self, seconds: f64) {
        self.play(Some(seconds));
    }
}

/// Outcome of a drift check that triggered a resync.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftCorrection {
    pub audio_time: f64,
    pub reference_time: f64,
    pub drift: f64,
}

/// Periodic drift check between the audio cursor and a reference clock.
///
/// Between checks both clocks run freely; a check only re-anchors the audio
/// when the gap exceeds the threshold.
#[derive(Debug, Clone)]
pub struct DriftMonitor {
    threshold: f64,
    interval: f64,
    next_check: Option<f64>,
}

impl DriftMonitor {
    pub fn new(threshold: f64, interval: f64) -> Self {
        Self {
            threshold,
            interval,
            next_check: None,
        }
    }

    pub fn from_config(config: &DriverConfig) -> Self {
        Self::new(config.drift_threshold, config.drift_interval)
    }

    /// Schedules the first check one interval after `now`.
    pub fn reset(&mut self, now: f64) {
        self.next_check = Some(now + self.interval);
    }

    /// Runs a check if one is due at `now`.
    pub fn poll<T: Resync + ?Sized>(
        &mut self,
        now: f64,
        reference_time: f64,
        target: &mut T,
    ) -> Option<DriftCorrection> {
        let due = *self.next_check.get_or_insert(now + self.interval);
        if now < due {
            return None;
        }
        self.next_check = Some(now + self.interval);
        tracing::debug!(now, "checking for drift");

        let audio_time = target.current_time();
        let drift = (reference_time - audio_time).abs();
        if drift <= self.threshold {
            return None;
        }

        target.resync_to(reference_time);
        Some(DriftCorrection {
            audio_time,
            reference_time,
            drift,
        })
    }
}

/// Operation a scripted session performs at a given time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SessionAction {
    Start,
    Pause,
    Resume,
    Seek { position: f64 },
    Speed { speed: f64 },
    Press { y: f64 },
    Drag { y: f64 },
    Release,
    Wheel { delta_y: f64 },
    ToggleMute,
    Cutoff { hz: f32 },
    Distortion { amount: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub time_seconds: f64,
    #[serde(flatten)]
    pub action: SessionAction,
}

impl ScheduledEvent {
    pub fn new(time_seconds: f64, action: SessionAction) -> Self {
        Self {
            time_seconds,
            action,
        }
    }
}

/// Releases scripted events in time order as the driver's wall clock passes
/// them.
#[derive(Debug, Default)]
pub struct Scheduler {
    events: Vec<ScheduledEvent>,
    next_event: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_events(&mut self, events: Vec<ScheduledEvent>) {
        self.events = events;
        self.events.sort_by(|a, b| {
            a.time_seconds
                .partial_cmp(&b.time_seconds)
                .unwrap_or(Ordering::Equal)
        });
        self.next_event = 0;
    }

    /// Returns every event due at or before `now` that has not fired yet.
    pub fn tick(&mut self, now: f64) -> &[ScheduledEvent] {
        let start = self.next_event;
        while self
            .events
            .get(self.next_event)
            .map(|event| event.time_seconds <= now)
            .unwrap_or(false)
        {
            self.next_event += 1;
        }
        &self.events[start..self.next_event]
    }

    pub fn is_finished(&self) -> bool {
        self.next_event >= self.events.len()
    }

    /// Time of the last scripted event, if any.
    pub fn end_time(&self) -> Option<f64> {
        self.events.last().map(|event| event.time_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct FakeAudio {
        time: f64,
        resyncs: Vec<f64>,
    }

    impl Resync for FakeAudio {
        fn current_time(&self) -> f64 {
            self.time
        }

        fn resync_to(&mut self, seconds: f64) {
            self.time = seconds;
            self.resyncs.push(seconds);
        }
    }

    #[test]
    fn clock_never_leaves_bounds() {
        let mut clock = PlaybackClock::with_limit(5.0);
        clock.advance(1.0, -3.0);
        assert_eq!(clock.time_seconds, 0.0);
        clock.advance(2.0, 4.0);
        assert_eq!(clock.time_seconds, 5.0);
        clock.reset();
        assert_eq!(clock.time_seconds, 0.0);
    }

    #[test]
    fn drift_is_only_checked_once_per_interval() {
        let mut monitor = DriftMonitor::new(0.2, 1.0);
        let mut audio = FakeAudio::default();
        monitor.reset(0.0);

        assert!(monitor.poll(0.5, 3.0, &mut audio).is_none());
        let correction = monitor.poll(1.0, 3.0, &mut audio).unwrap();
        assert_eq!(correction.audio_time, 0.0);
        assert_eq!(correction.drift, 3.0);
        assert_eq!(audio.resyncs, vec![3.0]);

        audio.time = 0.0;
        assert!(monitor.poll(1.5, 3.0, &mut audio).is_none());
        assert!(monitor.poll(2.0, 3.0, &mut audio).is_some());
    }

    #[test]
    fn small_drift_is_tolerated() {
        let mut monitor = DriftMonitor::new(0.2, 1.0);
        let mut audio = FakeAudio {
            time: 10.15,
            ..Default::default()
        };
        monitor.reset(0.0);
        assert!(monitor.poll(1.0, 10.0, &mut audio).is_none());
        assert!(audio.resyncs.is_empty());
    }

    #[test]
    fn scheduler_releases_events_in_order() {
        let mut scheduler = Scheduler::new();
        scheduler.set_events(vec![
            ScheduledEvent::new(2.0, SessionAction::Pause),
            ScheduledEvent::new(0.0, SessionAction::Start),
            ScheduledEvent::new(1.0, SessionAction::Wheel { delta_y: 40.0 }),
        ]);

        assert_eq!(scheduler.tick(0.0), &[ScheduledEvent::new(0.0, SessionAction::Start)]);
        assert!(scheduler.tick(0.5).is_empty());
        assert_eq!(scheduler.tick(5.0).len(), 2);
        assert!(scheduler.is_finished());
        assert_eq!(scheduler.end_time(), Some(2.0));
    }

    #[test]
    fn events_parse_from_json() {
        let events: Vec<ScheduledEvent> = serde_json::from_str(
            r#"[
                { "time_seconds": 0.0, "action": "start" },
                { "time_seconds": 1.5, "action": "speed", "speed": -4.0 },
                { "time_seconds": 2.0, "action": "drag", "y": 120.0 }
            ]"#,
        )
        .unwrap();

        assert_eq!(events[1].action, SessionAction::Speed { speed: -4.0 });
        assert_eq!(events[2].action, SessionAction::Drag { y: 120.0 });
    }
}
