use num_complex::Complex;

pub type RealVec = Vec<f64>;

/// One point of the complex plane. Real part is x, imaginary part is y.
pub type Sample = Complex<f64>;
pub type SampleVec = Vec<Sample>;
pub type SampleSlice = [Sample];

pub const TAU: f64 = std::f64::consts::TAU;

/// Time of sample `index` when one period is split into `sample_count` steps.
///
/// `index == sample_count` maps to 2π, closing the loop.
pub fn time_at(index: usize, sample_count: usize) -> f64 {
    index as f64 / sample_count as f64 * TAU
}
