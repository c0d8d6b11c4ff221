//! Core library for the scroll-driven audio scrubber.
//!
//! The centre of the crate is [`AudioTimeline`], which plays one decoded
//! asset forwards or backwards at a variable rate while keeping a cursor that
//! can be compared against an external animation clock. Around it sit the
//! pieces an interactive driver needs: decoding and fetching, a shared asset
//! cache, gesture speed control, drift correction, a session type that
//! wires them together and (with the `playback` feature) a cpal device
//! output that plays a session in real time.

pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod gesture;
pub mod logging;
pub mod session;
pub mod timeline;

pub use assets::AssetStore;
pub use audio::{
    AudioAsset, AudioTimeline, CurveShape, FrameClock, ManualClock, OutputClock,
    PlaybackDirection, Renderer, SampleBuffer, SystemClock,
};
#[cfg(feature = "playback")]
pub use audio::{DeviceOutput, OutputStream};
pub use config::{AppConfig, DriverConfig, EngineConfig};
pub use error::{Result, ScrubError};
pub use gesture::{SpeedController, SpeedUpdate, Tween};
pub use logging::ComponentLogger;
pub use session::{ScrubSession, TickReport};
pub use timeline::{
    DriftCorrection, DriftMonitor, PlaybackClock, Resync, ScheduledEvent, Scheduler,
    SessionAction,
};
