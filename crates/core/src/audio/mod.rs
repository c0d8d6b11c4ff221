//! Audio side of the scrubber: decoded assets, the output clocks, the one-shot
//! playback source, the effects chain, the [`AudioTimeline`] engine that ties
//! them together and the device output that plays it.

mod buffer;
mod clock;
pub mod decode;
mod effects;
mod engine;
pub mod fetch;
mod output;
mod source;

pub use buffer::{AudioAsset, PlaybackDirection, SampleBuffer};
pub use clock::{FrameClock, ManualClock, OutputClock, SystemClock};
pub use effects::{make_curve, shape_sample, CurveShape, EffectsChain, Gain, LowPass, Waveshaper};
pub use engine::AudioTimeline;
#[cfg(feature = "playback")]
pub use output::{DeviceOutput, OutputStream};
pub use output::{pull_block, Renderer};
pub use source::ActiveSource;
