//! Closed curves sampled into equally-parametrized point sequences.
//!
//! A [`Trajectory`] is one full period of a closed curve.
//! The point after the last one is implicitly the first.

use crate::common::{time_at, RealVec, Sample, SampleSlice, SampleVec};
use crate::error::{EpicycleError, Result};
use itertools::Itertools;
use std::f64::consts::FRAC_PI_2;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// N ordered complex-plane points, N >= 2, all finite.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    points: SampleVec,
}

impl Trajectory {
    pub fn new(points: SampleVec) -> Result<Trajectory> {
        if points.len() < 2 {
            return Err(EpicycleError::InvalidTrajectory {
                len: points.len(),
                reason: "at least 2 points are required".to_owned(),
            });
        }
        if let Some(n) = points.iter().position(|z| !z.is_finite()) {
            return Err(EpicycleError::InvalidTrajectory {
                len: points.len(),
                reason: format!("point {} is not finite ({})", n, points[n]),
            });
        }
        Ok(Trajectory { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false, kept for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &SampleSlice {
        &self.points
    }

    /// Largest absolute coordinate on either axis.
    pub fn extent(&self) -> f64 {
        self.points
            .iter()
            .map(|z| z.re.abs().max(z.im.abs()))
            .fold(0., f64::max)
    }
}

/// Anything able to produce one period of a closed curve as `sample_count` points.
///
/// Points must be equally spaced in the curve's own parametrization,
/// centered at the origin, with y pointing up.
pub trait TrajectorySource {
    /// Human-readable name, used in logs and errors.
    fn name(&self) -> String;

    fn sample(&self, sample_count: usize) -> Result<Trajectory>;
}

/// Built-in closed-form curves.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Shape {
    Circle,
    Square,
    Butterfly,
    Harmonic,
}

impl Shape {
    pub const NAMES: &'static [&'static str] = &["circle", "square", "butterfly", "harmonic"];
}

impl FromStr for Shape {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "circle" => Ok(Shape::Circle),
            "square" => Ok(Shape::Square),
            "butterfly" => Ok(Shape::Butterfly),
            "harmonic" => Ok(Shape::Harmonic),
            _ => Err(format!(
                "unknown shape {}, expected one of {}",
                s,
                Shape::NAMES.join(", ")
            )),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Circle => "circle",
            Shape::Square => "square",
            Shape::Butterfly => "butterfly",
            Shape::Harmonic => "harmonic",
        };
        f.write_str(name)
    }
}

/// Samples a [`Shape`] at `t_n = 2πn/N`.
#[derive(Debug, Copy, Clone)]
pub struct ParametricSource {
    pub shape: Shape,

    /// Angular frequency of [`Shape::Harmonic`]. Ignored by other shapes.
    pub harmonic: i64,
}

impl ParametricSource {
    pub fn new(shape: Shape) -> ParametricSource {
        ParametricSource { shape, harmonic: 1 }
    }

    pub fn harmonic(frequency: i64) -> ParametricSource {
        ParametricSource {
            shape: Shape::Harmonic,
            harmonic: frequency,
        }
    }

    fn point_at(&self, t: f64) -> Sample {
        match self.shape {
            Shape::Circle => Sample::from_polar(1., t),
            Shape::Square => {
                // Each quadrant is one side; sec() of the offset from its midpoint
                // stretches the unit circle onto the side.
                let quadrant = (t / FRAC_PI_2).floor().clamp(0., 3.);
                let r = 1. / (t - (quadrant + 0.5) * FRAC_PI_2).cos();
                Sample::from_polar(r, t)
            }
            Shape::Butterfly => {
                let r = t.cos().exp() - 2. * (4. * t).cos() - (t / 12.).sin().powi(5);
                Sample::new(t.sin() * r, t.cos() * r)
            }
            Shape::Harmonic => Sample::from_polar(1., self.harmonic as f64 * t),
        }
    }
}

impl TrajectorySource for ParametricSource {
    fn name(&self) -> String {
        match self.shape {
            Shape::Harmonic => format!("harmonic({})", self.harmonic),
            shape => shape.to_string(),
        }
    }

    fn sample(&self, sample_count: usize) -> Result<Trajectory> {
        let points = (0..sample_count)
            .map(|n| self.point_at(time_at(n, sample_count)))
            .collect();
        Trajectory::new(points)
    }
}

/// Loads a closed polyline from a JSON array of `[x, y]` pairs,
/// and walks it at equal arc-length steps.
#[derive(Debug, Clone)]
pub struct PointFileSource {
    pub path: PathBuf,

    /// Input uses screen coordinates (y grows downward) and must be flipped.
    pub flip_y: bool,
}

impl PointFileSource {
    pub fn new(path: impl Into<PathBuf>) -> PointFileSource {
        PointFileSource {
            path: path.into(),
            flip_y: true,
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> EpicycleError {
        EpicycleError::SourceUnavailable {
            source_name: self.name(),
            reason: reason.into(),
        }
    }

    fn load(&self) -> Result<SampleVec> {
        let text = fs::read_to_string(&self.path).map_err(|e| self.unavailable(e.to_string()))?;
        let pairs: Vec<[f64; 2]> =
            serde_json::from_str(&text).map_err(|e| self.unavailable(e.to_string()))?;

        let mut points: SampleVec = pairs
            .iter()
            .map(|&[x, y]| Sample::new(x, y))
            .dedup()
            .collect();
        // A trailing copy of the first point only repeats the closing segment.
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }

        if points.len() < 2 {
            return Err(self.unavailable(format!(
                "need at least 2 distinct points, found {}",
                points.len()
            )));
        }
        if points.iter().any(|z| !z.is_finite()) {
            return Err(self.unavailable("contains non-finite coordinates"));
        }

        let (min_x, max_x) = min_max(points.iter().map(|z| z.re));
        let (min_y, max_y) = min_max(points.iter().map(|z| z.im));
        let center = Sample::new((min_x + max_x) / 2., (min_y + max_y) / 2.);
        for z in points.iter_mut() {
            *z -= center;
            if self.flip_y {
                z.im = -z.im;
            }
        }
        Ok(points)
    }
}

impl TrajectorySource for PointFileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn sample(&self, sample_count: usize) -> Result<Trajectory> {
        let polyline = self.load()?;
        let points = resample_closed(&polyline, sample_count);
        Trajectory::new(points)
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Walks the closed polyline `vertices -> vertices[0]` and returns `count` points
/// spaced by `perimeter / count`, starting at `vertices[0]`.
///
/// Preconditions: `vertices.len() >= 2`, not all vertices equal.
fn resample_closed(vertices: &SampleSlice, count: usize) -> SampleVec {
    let segments: Vec<(Sample, Sample)> = vertices
        .iter()
        .copied()
        .circular_tuple_windows()
        .collect();
    let lengths: RealVec = segments.iter().map(|(a, b)| (b - a).norm()).collect();
    let perimeter: f64 = lengths.iter().sum();

    let mut out = Vec::with_capacity(count);
    let mut seg = 0;
    let mut seg_start = 0.;
    for n in 0..count {
        let target = perimeter * n as f64 / count as f64;
        while seg + 1 < segments.len() && seg_start + lengths[seg] <= target {
            seg_start += lengths[seg];
            seg += 1;
        }
        let (a, b) = segments[seg];
        let frac = if lengths[seg] > 0. {
            ((target - seg_start) / lengths[seg]).clamp(0., 1.)
        } else {
            0.
        };
        out.push(a + (b - a) * frac);
    }
    out
}
