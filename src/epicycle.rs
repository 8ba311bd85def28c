//! Truncated partial sums of a ranked spectrum, one time step at a time.
//!
//! Ranked component `m` (1-based) contributes a circle of radius `|amplitude_m|`,
//! centered on the previous partial sum `c[m-1]`,
//! rotating at the angular velocity of its original bin.

use crate::common::{time_at, Sample, SampleSlice, SampleVec, TAU};
use crate::error::{EpicycleError, Result};
use crate::fft::RankedSpectrum;
use num_traits::Zero;

/// One circle of the chain at a given instant.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Circle {
    pub center: Sample,
    pub radius: f64,
}

impl Circle {
    /// `segments + 1` points around the circle, first and last coinciding.
    pub fn outline(&self, segments: usize) -> impl Iterator<Item = Sample> + '_ {
        (0..=segments).map(move |s| {
            let theta = TAU * s as f64 / segments as f64;
            self.center + Sample::from_polar(self.radius, theta)
        })
    }
}

/// Partial sums `c[0..=K]` at time step `i`. Recomputed per frame, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionState {
    pub time_index: usize,
    pub time: f64,

    /// `c[0] = 0`; `c[m] = c[m-1] + amplitude_m · exp(i·k_m·t)`.
    centers: SampleVec,
    radii: Vec<f64>,
}

impl ReconstructionState {
    pub fn circle_count(&self) -> usize {
        self.radii.len()
    }

    pub fn centers(&self) -> &SampleSlice {
        &self.centers
    }

    /// The truncated approximation `c[K]`.
    pub fn endpoint(&self) -> Sample {
        self.centers[self.radii.len()]
    }

    /// The K circles, largest first. Circle `m` is centered on `c[m]` (0-based).
    pub fn circles(&self) -> impl ExactSizeIterator<Item = Circle> + '_ {
        self.centers
            .iter()
            .zip(&self.radii)
            .map(|(&center, &radius)| Circle { center, radius })
    }
}

/// Fails unless `1 <= circles <= spectrum.len()`.
pub fn check_truncation(spectrum: &RankedSpectrum, circles: usize) -> Result<()> {
    if circles == 0 || circles > spectrum.len() {
        return Err(EpicycleError::InvalidTruncation {
            circles,
            samples: spectrum.len(),
        });
    }
    Ok(())
}

/// Rotating terms of the first `circles` ranked components at `t_i`.
fn terms(
    spectrum: &RankedSpectrum,
    time_index: usize,
    circles: usize,
) -> impl Iterator<Item = Sample> + '_ {
    let t = time_at(time_index, spectrum.len());
    spectrum.components()[..circles]
        .iter()
        .map(move |c| c.amplitude * Sample::from_polar(1., c.source_index as f64 * t))
}

/// Computes `c[0..=K]` for time step `time_index` using the `circles` largest components.
///
/// Only the first K+1 partial sums are evaluated.
/// `time_index` is normally in `0..=N`; larger values wrap around the period.
pub fn reconstruct_at(
    spectrum: &RankedSpectrum,
    time_index: usize,
    circles: usize,
) -> Result<ReconstructionState> {
    check_truncation(spectrum, circles)?;

    let mut centers = Vec::with_capacity(circles + 1);
    let mut acc = Sample::zero();
    centers.push(acc);
    for term in terms(spectrum, time_index, circles) {
        acc += term;
        centers.push(acc);
    }

    let radii = spectrum.components()[..circles]
        .iter()
        .map(|c| c.magnitude())
        .collect();

    Ok(ReconstructionState {
        time_index,
        time: time_at(time_index, spectrum.len()),
        centers,
        radii,
    })
}

/// `c[K]` alone, without materializing the chain.
pub fn reconstruct_point(
    spectrum: &RankedSpectrum,
    time_index: usize,
    circles: usize,
) -> Result<Sample> {
    check_truncation(spectrum, circles)?;
    Ok(terms(spectrum, time_index, circles).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::decompose;
    use crate::trajectory::{ParametricSource, Shape, Trajectory, TrajectorySource};

    const EPS: f64 = 1e-9;

    fn spectrum_of(shape: Shape, n: usize) -> (Trajectory, RankedSpectrum) {
        let traj = ParametricSource::new(shape).sample(n).unwrap();
        let spectrum = decompose(&traj).unwrap();
        (traj, spectrum)
    }

    #[test]
    fn full_spectrum_reproduces_every_point() {
        for &shape in &[Shape::Square, Shape::Butterfly] {
            let (traj, spectrum) = spectrum_of(shape, 40);
            for (i, &z) in traj.points().iter().enumerate() {
                let state = reconstruct_at(&spectrum, i, 40).unwrap();
                assert!((state.endpoint() - z).norm() < EPS, "{} at {}", shape, i);
            }
        }
    }

    #[test]
    fn loop_closes() {
        let (_, spectrum) = spectrum_of(Shape::Butterfly, 64);
        for k in &[1, 7, 32, 64] {
            let first = reconstruct_at(&spectrum, 0, *k).unwrap().endpoint();
            let last = reconstruct_at(&spectrum, 64, *k).unwrap().endpoint();
            assert!((first - last).norm() < EPS);
        }
    }

    #[test]
    fn truncation_bounds() {
        let (_, spectrum) = spectrum_of(Shape::Circle, 16);
        assert_eq!(
            reconstruct_at(&spectrum, 0, 0),
            Err(EpicycleError::InvalidTruncation {
                circles: 0,
                samples: 16
            })
        );
        assert_eq!(
            reconstruct_at(&spectrum, 0, 17).unwrap_err(),
            EpicycleError::InvalidTruncation {
                circles: 17,
                samples: 16
            }
        );
        assert!(reconstruct_at(&spectrum, 0, 1).is_ok());
        assert!(reconstruct_at(&spectrum, 0, 16).is_ok());
    }

    #[test]
    fn chain_shape() {
        let (_, spectrum) = spectrum_of(Shape::Square, 32);
        let state = reconstruct_at(&spectrum, 5, 6).unwrap();

        assert_eq!(state.circle_count(), 6);
        assert_eq!(state.centers().len(), 7);
        assert_eq!(state.centers()[0], Sample::new(0., 0.));
        assert_eq!(state.endpoint(), state.centers()[6]);

        let circles: Vec<Circle> = state.circles().collect();
        assert_eq!(circles.len(), 6);
        for (m, circle) in circles.iter().enumerate() {
            assert_eq!(circle.center, state.centers()[m]);
            assert_eq!(circle.radius, spectrum.components()[m].magnitude());
            // Each link of the chain is exactly one radius long.
            let link = (state.centers()[m + 1] - circle.center).norm();
            assert!((link - circle.radius).abs() < EPS);
        }
    }

    #[test]
    fn single_circle_at_time_zero_is_the_top_amplitude() {
        let traj = Trajectory::new(vec![
            Sample::new(1., 0.),
            Sample::new(0., 1.),
            Sample::new(-1., 0.),
            Sample::new(0., -1.),
        ])
        .unwrap();
        let spectrum = decompose(&traj).unwrap();
        let state = reconstruct_at(&spectrum, 0, 1).unwrap();
        assert!((state.endpoint() - spectrum.components()[0].amplitude).norm() < EPS);
    }

    #[test]
    fn point_matches_state_endpoint() {
        let (_, spectrum) = spectrum_of(Shape::Butterfly, 50);
        for i in 0..=50 {
            let a = reconstruct_at(&spectrum, i, 12).unwrap().endpoint();
            let b = reconstruct_point(&spectrum, i, 12).unwrap();
            assert!((a - b).norm() < EPS);
        }
    }

    #[test]
    fn error_shrinks_as_circles_grow() {
        let (traj, spectrum) = spectrum_of(Shape::Butterfly, 128);
        let errors: Vec<f64> = (1..=128)
            .map(|k| spectrum.mean_squared_error(&traj, k).unwrap())
            .collect();
        for pair in errors.windows(2) {
            assert!(pair[1] <= pair[0] + EPS, "{:?}", pair);
        }
        assert!(errors[127] < EPS);
    }

    #[test]
    fn outline_is_closed() {
        let circle = Circle {
            center: Sample::new(2., -1.),
            radius: 0.5,
        };
        let points: Vec<Sample> = circle.outline(16).collect();
        assert_eq!(points.len(), 17);
        assert!((points[0] - points[16]).norm() < EPS);
        for z in &points {
            assert!(((z - circle.center).norm() - 0.5).abs() < EPS);
        }
    }
}
