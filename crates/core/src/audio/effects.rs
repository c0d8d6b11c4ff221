//! Effects applied to the active source before it reaches the output:
//! gain, then a low-pass filter, then an optional waveshaper.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

const FILTER_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;
const MIN_CUTOFF_HZ: f32 = 20.0;

/// Linear gain stage.
#[derive(Debug, Clone)]
pub struct Gain {
    value: f32,
}

impl Default for Gain {
    fn default() -> Self {
        Self { value: 1.0 }
    }
}

impl Gain {
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value.max(0.0);
    }

    pub fn process(&self, block: &mut [f32]) {
        if (self.value - 1.0).abs() <= f32::EPSILON {
            return;
        }
        for sample in block.iter_mut() {
            *sample *= self.value;
        }
    }
}

/// State-variable low-pass filter with independent state per channel.
///
/// The filter is bypassed while the cutoff sits at or above the configured
/// fully-open frequency.
#[derive(Debug, Clone)]
pub struct LowPass {
    cutoff: f32,
    open_cutoff: f32,
    sample_rate: f32,
    // Integrator state per channel.
    state: Vec<[f32; 2]>,
    a1: f32,
    a2: f32,
    a3: f32,
}

impl LowPass {
    pub fn new(open_cutoff: f32, sample_rate: u32) -> Self {
        let mut filter = Self {
            cutoff: open_cutoff,
            open_cutoff,
            sample_rate: sample_rate.max(1) as f32,
            state: Vec::new(),
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
        };
        filter.recalc_coeffs();
        filter
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn open_cutoff(&self) -> f32 {
        self.open_cutoff
    }

    pub fn is_open(&self) -> bool {
        self.cutoff >= self.open_cutoff
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        let was_open = self.is_open();
        self.cutoff = cutoff.max(MIN_CUTOFF_HZ);
        if was_open && !self.is_open() {
            self.reset();
        }
        self.recalc_coeffs();
    }

    pub fn reset(&mut self) {
        self.state.iter_mut().for_each(|s| *s = [0.0; 2]);
    }

    fn recalc_coeffs(&mut self) {
        let cutoff = self
            .cutoff
            .clamp(MIN_CUTOFF_HZ, (self.sample_rate * 0.49).max(MIN_CUTOFF_HZ));
        let g = (PI * cutoff / self.sample_rate).tan();
        let k = 1.0 / FILTER_Q;
        self.a1 = 1.0 / (1.0 + g * (g + k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    pub fn process(&mut self, block: &mut [f32], channels: usize) {
        if self.is_open() || channels == 0 {
            return;
        }
        if self.state.len() != channels {
            self.state = vec![[0.0; 2]; channels];
        }

        for frame in block.chunks_mut(channels) {
            for (sample, state) in frame.iter_mut().zip(self.state.iter_mut()) {
                let [ic1eq, ic2eq] = *state;
                let v3 = *sample - ic2eq;
                let v1 = self.a1 * ic1eq + self.a2 * v3;
                let v2 = ic2eq + self.a2 * ic1eq + self.a3 * v3;
                *state = [2.0 * v1 - ic1eq, 2.0 * v2 - ic2eq];
                *sample = v2;
            }
        }
    }
}

/// Family of distortion curves the waveshaper can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveShape {
    /// Rational saturating curve, `(3 + k) * x * 20deg / (pi + k * |x|)`.
    #[default]
    Rational,
    /// Normalised hyperbolic tangent, `tanh((1 + k) x) / tanh(1 + k)`.
    Tanh,
}

/// Maps one input sample to the shaped output. Odd-symmetric in `x`.
pub fn shape_sample(shape: CurveShape, amount: f32, x: f32) -> f32 {
    match shape {
        CurveShape::Rational => {
            let deg = PI / 180.0;
            (3.0 + amount) * x * 20.0 * deg / (PI + amount * x.abs())
        }
        CurveShape::Tanh => {
            let drive = 1.0 + amount;
            (drive * x).tanh() / drive.tanh()
        }
    }
}

/// Tabulates `shape_sample` over `[-1, 1]` with `points` entries.
pub fn make_curve(shape: CurveShape, amount: f32, points: usize) -> Vec<f32> {
    let points = points.max(2);
    (0..points)
        .map(|i| {
            let x = i as f32 * 2.0 / (points - 1) as f32 - 1.0;
            shape_sample(shape, amount, x)
        })
        .collect()
}

/// Table-driven waveshaper. An amount of zero bypasses it.
#[derive(Debug, Clone)]
pub struct Waveshaper {
    shape: CurveShape,
    amount: f32,
    points: usize,
    curve: Vec<f32>,
}

impl Waveshaper {
    pub fn new(shape: CurveShape, points: usize) -> Self {
        Self {
            shape,
            amount: 0.0,
            points,
            curve: Vec::new(),
        }
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount.max(0.0);
        self.curve = if self.amount > 0.0 {
            make_curve(self.shape, self.amount, self.points)
        } else {
            Vec::new()
        };
    }

    fn lookup(&self, x: f32) -> f32 {
        let last = self.curve.len() - 1;
        let position = (x.clamp(-1.0, 1.0) + 1.0) * 0.5 * last as f32;
        let index = (position.floor() as usize).min(last);
        let next = (index + 1).min(last);
        let fraction = position - index as f32;
        self.curve[index] + (self.curve[next] - self.curve[index]) * fraction
    }

    pub fn process(&self, block: &mut [f32]) {
        if self.curve.is_empty() {
            return;
        }
        for sample in block.iter_mut() {
            *sample = self.lookup(*sample);
        }
    }
}

/// Fixed chain of gain, low-pass filter and waveshaper.
#[derive(Debug, Clone)]
pub struct EffectsChain {
    pub gain: Gain,
    pub filter: LowPass,
    pub shaper: Waveshaper,
}

impl EffectsChain {
    pub fn new(open_cutoff: f32, sample_rate: u32, shape: CurveShape, curve_points: usize) -> Self {
        Self {
            gain: Gain::default(),
            filter: LowPass::new(open_cutoff, sample_rate),
            shaper: Waveshaper::new(shape, curve_points),
        }
    }

    /// Processes one interleaved block in place.
    pub fn process(&mut self, block: &mut [f32], channels: usize) {
        self.gain.process(block);
        self.filter.process(block, channels);
        self.shaper.process(block);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn curves_are_odd_symmetric_and_deterministic() {
        for shape in [CurveShape::Rational, CurveShape::Tanh] {
            for &x in &[0.0f32, 0.1, 0.5, 0.9, 1.0] {
                let a = shape_sample(shape, 50.0, x);
                let b = shape_sample(shape, 50.0, -x);
                assert_relative_eq!(a, -b);
                assert_eq!(a, shape_sample(shape, 50.0, x));
            }
        }
        assert_eq!(make_curve(CurveShape::Tanh, 4.0, 64), make_curve(CurveShape::Tanh, 4.0, 64));
    }

    #[test]
    fn tanh_curve_is_normalised() {
        assert_relative_eq!(shape_sample(CurveShape::Tanh, 3.0, 1.0), 1.0);
        assert_relative_eq!(shape_sample(CurveShape::Tanh, 3.0, -1.0), -1.0);
    }

    #[test]
    fn waveshaper_bypasses_at_zero_and_saturates_above() {
        let mut shaper = Waveshaper::new(CurveShape::Tanh, 1025);
        let mut block = [0.25f32, -0.25];
        shaper.process(&mut block);
        assert_eq!(block, [0.25, -0.25]);

        shaper.set_amount(10.0);
        shaper.process(&mut block);
        assert!(block[0] > 0.25);
        assert_relative_eq!(block[0], -block[1]);
    }

    #[test]
    fn open_filter_is_transparent() {
        let mut chain = EffectsChain::new(20_000.0, 48_000, CurveShape::Rational, 256);
        let mut block = [0.1f32, -0.2, 0.3, -0.4];
        chain.process(&mut block, 2);
        assert_eq!(block, [0.1, -0.2, 0.3, -0.4]);
    }

    #[test]
    fn closed_filter_attenuates_nyquist_and_passes_dc() {
        let mut filter = LowPass::new(20_000.0, 48_000);
        filter.set_cutoff(500.0);
        assert!(!filter.is_open());

        let mut alternating: Vec<f32> = (0..512).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        filter.process(&mut alternating, 1);
        assert!(alternating[400..].iter().all(|s| s.abs() < 0.05));

        filter.reset();
        let mut dc = vec![1.0f32; 4096];
        filter.process(&mut dc, 1);
        assert_relative_eq!(dc[4095], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn gain_scales_block() {
        let mut gain = Gain::default();
        gain.set_value(0.5);
        let mut block = [1.0f32, -0.5];
        gain.process(&mut block);
        assert_eq!(block, [0.5, -0.25]);
        gain.set_value(-3.0);
        assert_eq!(gain.value(), 0.0);
    }
}
