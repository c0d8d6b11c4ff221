use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Instant,
};

/// Monotonic time reference of the audio output.
///
/// The clock only advances while it is running; suspending it freezes
/// [`OutputClock::now`] until the next resume.
pub trait OutputClock: Send {
    /// Current output time in seconds.
    fn now(&self) -> f64;
    fn resume(&mut self);
    fn suspend(&mut self);
    fn is_running(&self) -> bool;
}

/// Output clock backed by the host's monotonic wall clock.
#[derive(Debug, Default)]
pub struct SystemClock {
    accumulated: f64,
    running_since: Option<Instant>,
}

impl SystemClock {
    /// Creates a suspended clock reading zero.
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputClock for SystemClock {
    fn now(&self) -> f64 {
        self.accumulated
            + self
                .running_since
                .map(|since| since.elapsed().as_secs_f64())
                .unwrap_or(0.0)
    }

    fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    fn suspend(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed().as_secs_f64();
        }
    }

    fn is_running(&self) -> bool {
        self.running_since.is_some()
    }
}

#[derive(Debug, Default)]
struct ManualState {
    time: f64,
    running: bool,
}

/// Output clock that only moves when told to.
///
/// Clones share the same time, so an offline renderer (or a test) can keep a
/// handle and advance the clock an engine owns.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `seconds` if it is running.
    pub fn advance(&self, seconds: f64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.running && seconds > 0.0 {
            state.time += seconds;
        }
    }
}

impl OutputClock for ManualClock {
    fn now(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .time
    }

    fn resume(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running = true;
    }

    fn suspend(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running = false;
    }

    fn is_running(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running
    }
}

#[derive(Debug)]
struct FrameCounter {
    sample_rate: u32,
    frames: AtomicU64,
    running: AtomicBool,
}

/// Output clock driven by the frames an audio device has consumed.
///
/// The device callback calls [`FrameClock::advance_frames`] after each block,
/// so the clock reads exactly the amount of audio handed to the hardware.
/// Clones share the same counter.
#[derive(Debug, Clone)]
pub struct FrameClock {
    counter: Arc<FrameCounter>,
}

impl FrameClock {
    /// Creates a suspended clock counting frames at `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            counter: Arc::new(FrameCounter {
                sample_rate: sample_rate.max(1),
                frames: AtomicU64::new(0),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.counter.sample_rate
    }

    /// Frames counted so far.
    pub fn frames(&self) -> u64 {
        self.counter.frames.load(Ordering::Acquire)
    }

    /// Counts `frames` rendered frames. Ignored while suspended.
    pub fn advance_frames(&self, frames: usize) {
        if self.counter.running.load(Ordering::Acquire) {
            self.counter
                .frames
                .fetch_add(frames as u64, Ordering::AcqRel);
        }
    }
}

impl OutputClock for FrameClock {
    fn now(&self) -> f64 {
        self.frames() as f64 / self.counter.sample_rate as f64
    }

    fn resume(&mut self) {
        self.counter.running.store(true, Ordering::Release);
    }

    fn suspend(&mut self) {
        self.counter.running.store(false, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.counter.running.load(Ordering::Acquire)
    }
}
