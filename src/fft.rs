use crate::common::{Sample, SampleVec};
use crate::epicycle::reconstruct_point;
use crate::error::{EpicycleError, Result};
use crate::trajectory::Trajectory;
use rustfft::FftPlanner;
use serde::Serialize;
use std::cmp::Ordering;

/// One normalized DFT coefficient, remembering which bin it came from.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrequencyComponent {
    pub amplitude: Sample,

    /// Bin index `k` before sorting. Doubles as the angular velocity.
    pub source_index: usize,
}

impl FrequencyComponent {
    pub fn magnitude(&self) -> f64 {
        self.amplitude.norm()
    }

    /// Ranking order: larger magnitude first, then lower bin first.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .magnitude()
            .total_cmp(&self.magnitude())
            .then(self.source_index.cmp(&other.source_index))
    }
}

/// All N components of a trajectory, by descending magnitude.
///
/// Nothing is discarded here. Truncation happens during reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSpectrum {
    components: Vec<FrequencyComponent>,
}

impl RankedSpectrum {
    /// Number of components, equal to the trajectory's sample count.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[FrequencyComponent] {
        &self.components
    }

    /// Largest component magnitude, or 0 for an all-zero trajectory.
    pub fn peak_magnitude(&self) -> f64 {
        self.components.first().map_or(0., |c| c.magnitude())
    }

    /// Mean of `|c[K] - z[i]|²` over all `i` in `0..N`.
    pub fn mean_squared_error(&self, trajectory: &Trajectory, circles: usize) -> Result<f64> {
        let n = trajectory.len();
        if n != self.len() {
            return Err(EpicycleError::InvalidTrajectory {
                len: n,
                reason: format!("spectrum was computed from {} points", self.len()),
            });
        }
        let mut total = 0.;
        for (i, &z) in trajectory.points().iter().enumerate() {
            let approx = reconstruct_point(self, i, circles)?;
            total += (approx - z).norm_sqr();
        }
        Ok(total / n as f64)
    }

    /// Serializable view of the ranking, for export.
    pub fn records(&self) -> Vec<ComponentRecord> {
        self.components
            .iter()
            .map(|c| ComponentRecord {
                index: c.source_index,
                re: c.amplitude.re,
                im: c.amplitude.im,
                magnitude: c.magnitude(),
                phase: c.amplitude.arg(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentRecord {
    pub index: usize,
    pub re: f64,
    pub im: f64,
    pub magnitude: f64,
    pub phase: f64,
}

/// Computes `Z[k] = (1/N) Σ z[n] exp(-2πi·k·n/N)` and ranks the result.
pub fn decompose(trajectory: &Trajectory) -> Result<RankedSpectrum> {
    // `Trajectory::new` guarantees n >= 2.
    let n = trajectory.len();
    let mut buffer: SampleVec = trajectory.points().to_vec();
    let fft = FftPlanner::<f64>::new().plan_fft_forward(n);
    fft.process(&mut buffer);
    for elem in buffer.iter_mut() {
        *elem /= n as f64;
    }

    let mut components: Vec<FrequencyComponent> = buffer
        .into_iter()
        .enumerate()
        .map(|(source_index, amplitude)| FrequencyComponent {
            amplitude,
            source_index,
        })
        .collect();
    components.sort_by(FrequencyComponent::rank_cmp);

    Ok(RankedSpectrum { components })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TAU;
    use crate::trajectory::{ParametricSource, Shape, TrajectorySource};

    const EPS: f64 = 1e-9;

    fn naive_dft(points: &[Sample]) -> SampleVec {
        let n = points.len();
        (0..n)
            .map(|k| {
                points
                    .iter()
                    .enumerate()
                    .map(|(j, z)| z * Sample::from_polar(1., -TAU * (k * j) as f64 / n as f64))
                    .sum::<Sample>()
                    / n as f64
            })
            .collect()
    }

    #[test]
    fn matches_the_definition() {
        let traj = ParametricSource::new(Shape::Butterfly).sample(37).unwrap();
        let expected = naive_dft(traj.points());
        let spectrum = decompose(&traj).unwrap();

        assert_eq!(spectrum.len(), 37);
        for c in spectrum.components() {
            assert!((c.amplitude - expected[c.source_index]).norm() < EPS);
        }
    }

    #[test]
    fn keeps_every_bin_exactly_once() {
        let traj = ParametricSource::new(Shape::Square).sample(50).unwrap();
        let spectrum = decompose(&traj).unwrap();
        let mut seen: Vec<usize> = spectrum.components().iter().map(|c| c.source_index).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn ranking_is_descending_with_index_tie_break() {
        let traj = ParametricSource::new(Shape::Square).sample(64).unwrap();
        let spectrum = decompose(&traj).unwrap();
        for pair in spectrum.components().windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.magnitude() >= b.magnitude());
            if a.magnitude() == b.magnitude() {
                assert!(a.source_index < b.source_index);
            }
        }
    }

    #[test]
    fn exact_ties_prefer_lower_bin() {
        // All-zero input: every magnitude ties at exactly 0.
        let traj = Trajectory::new(vec![Sample::new(0., 0.); 6]).unwrap();
        let spectrum = decompose(&traj).unwrap();
        let order: Vec<usize> = spectrum.components().iter().map(|c| c.source_index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(spectrum.peak_magnitude(), 0.);
    }

    #[test]
    fn unit_square_corners() {
        let traj = Trajectory::new(vec![
            Sample::new(1., 0.),
            Sample::new(0., 1.),
            Sample::new(-1., 0.),
            Sample::new(0., -1.),
        ])
        .unwrap();
        let spectrum = decompose(&traj).unwrap();

        let z0 = spectrum.components().iter().find(|c| c.source_index == 0).unwrap();
        assert!(z0.magnitude() < EPS);

        let top = spectrum.components()[0];
        assert_eq!(top.source_index, 1);
        assert!((top.amplitude - Sample::new(1., 0.)).norm() < EPS);
        for c in &spectrum.components()[1..] {
            assert!(c.magnitude() < EPS);
        }
    }

    #[test]
    fn single_frequency_dominates() {
        let traj = ParametricSource::harmonic(5).sample(256).unwrap();
        let spectrum = decompose(&traj).unwrap();

        let top = spectrum.components()[0];
        assert_eq!(top.source_index, 5);
        assert!((top.magnitude() - 1.).abs() < EPS);
        for c in &spectrum.components()[1..] {
            assert!(c.magnitude() < EPS);
        }
    }

    #[test]
    fn real_sinusoid_splits_into_mirrored_bins() {
        let n = 256;
        let points = (0..n)
            .map(|j| Sample::new((5. * TAU * j as f64 / n as f64).cos(), 0.))
            .collect();
        let spectrum = decompose(&Trajectory::new(points).unwrap()).unwrap();

        let top: Vec<usize> = spectrum.components()[..2].iter().map(|c| c.source_index).collect();
        assert!(top.contains(&5) && top.contains(&251), "{:?}", top);
        for c in &spectrum.components()[..2] {
            assert!((c.magnitude() - 0.5).abs() < EPS);
        }
        for c in &spectrum.components()[2..] {
            assert!(c.magnitude() < EPS);
        }
    }

    #[test]
    fn error_needs_matching_lengths() {
        let spectrum = decompose(&ParametricSource::new(Shape::Circle).sample(8).unwrap()).unwrap();
        let other = ParametricSource::new(Shape::Circle).sample(9).unwrap();
        assert!(matches!(
            spectrum.mean_squared_error(&other, 1),
            Err(EpicycleError::InvalidTrajectory { len: 9, .. })
        ));
    }

    #[test]
    fn records_follow_ranking() {
        let traj = ParametricSource::harmonic(2).sample(8).unwrap();
        let spectrum = decompose(&traj).unwrap();
        let records = spectrum.records();
        assert_eq!(records.len(), 8);
        assert_eq!(records[0].index, 2);
        assert!((records[0].magnitude - 1.).abs() < EPS);

        let json = serde_json::to_string(&records[0]).unwrap();
        assert!(json.starts_with("{\"index\":2,"));
    }
}
