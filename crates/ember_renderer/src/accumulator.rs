//! Per-pixel sample averaging.

use crate::material::Color;

/// Running average and luminance variance of the samples of one pixel.
///
/// The average is kept in double precision and updated incrementally
/// (`avg += (value - avg) / n`), so long sample runs do not drift the way
/// a naive sum would. Luminance variance uses Welford's method.
#[derive(Debug, Clone, Default)]
pub struct PixelAccumulator {
    count: u32,
    average: [f64; 3],
    mean: f64,
    squares: f64,
}

impl PixelAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample. Returns false (and ignores it) when any channel is
    /// not finite.
    pub fn accumulate(&mut self, sample: Color) -> bool {
        if !sample.is_finite() {
            return false;
        }

        self.count += 1;
        let n = self.count as f64;

        for (average, value) in self.average.iter_mut().zip(sample.to_array()) {
            *average += (value as f64 - *average) / n;
        }

        let luminance = luminance(sample) as f64;
        let delta = luminance - self.mean;
        self.mean += delta / n;
        self.squares += delta * (luminance - self.mean);

        true
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn average(&self) -> Color {
        Color::new(
            self.average[0] as f32,
            self.average[1] as f32,
            self.average[2] as f32,
        )
    }

    /// Relative standard deviation of luminance, clamped to [0, 1].
    ///
    /// Zero until at least two samples are in.
    pub fn deviation(&self) -> f32 {
        if self.count < 2 {
            return 0.0;
        }
        let variance = self.squares / (self.count - 1) as f64;
        let mean = self.mean.abs().max(1e-4);
        (variance.sqrt() / mean).clamp(0.0, 1.0) as f32
    }
}

/// Rec. 709 luminance.
#[inline]
pub fn luminance(color: Color) -> f32 {
    color.dot(Color::new(0.2126, 0.7152, 0.0722))
}
