//! Steps one animation run through every time sample and feeds a [`PresentationSink`].

use crate::common::{time_at, Sample};
use crate::epicycle::{check_truncation, reconstruct_at, ReconstructionState};
use crate::fft::{decompose, RankedSpectrum};
use crate::trajectory::Trajectory;
use anyhow::{Context, Result};
use tracing::debug;

/// Per-run options. Passed into every [`AnimationDriver::start`] call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Truncation K, `1 <= K <= N`.
    pub circles: usize,

    /// Persist every frame.
    pub save_frames: bool,

    /// Persist the last frame only.
    pub save_final: bool,
}

impl RunConfig {
    pub fn new(circles: usize) -> RunConfig {
        RunConfig {
            circles,
            save_frames: false,
            save_final: false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TracePoint {
    pub time: f64,
    pub point: Sample,
}

/// Everything drawn so far during one run. Only grows until the run ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationHistory {
    tracer: Vec<TracePoint>,
    real: Vec<(f64, f64)>,
    imaginary: Vec<(f64, f64)>,
}

impl AnimationHistory {
    pub fn tracer(&self) -> &[TracePoint] {
        &self.tracer
    }

    /// `(t_i, Re(c[K]))` samples.
    pub fn real(&self) -> &[(f64, f64)] {
        &self.real
    }

    /// `(t_i, Im(c[K]))` samples.
    pub fn imaginary(&self) -> &[(f64, f64)] {
        &self.imaginary
    }

    pub fn len(&self) -> usize {
        self.tracer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracer.is_empty()
    }

    fn push(&mut self, time: f64, point: Sample) {
        self.tracer.push(TracePoint { time, point });
        self.real.push((time, point.re));
        self.imaginary.push((time, point.im));
    }

    fn clear(&mut self) {
        self.tracer.clear();
        self.real.clear();
        self.imaginary.clear();
    }
}

/// Headroom added when a projection sample outgrows its axis.
const BOUND_HEADROOM: f64 = 1.1;

/// Symmetric half-ranges of the three views.
///
/// `plane` is fixed for a run. `real` and `imaginary` never shrink within a run,
/// so earlier history stays inside the axes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AxisBounds {
    pub plane: f64,
    pub real: f64,
    pub imaginary: f64,
}

impl AxisBounds {
    fn new(trajectory: &Trajectory, spectrum: &RankedSpectrum) -> AxisBounds {
        let peak = spectrum.peak_magnitude();
        AxisBounds {
            plane: trajectory.extent() * BOUND_HEADROOM,
            real: peak,
            imaginary: peak,
        }
    }

    fn observe(&mut self, point: Sample) {
        self.real = self.real.max(point.re.abs() * BOUND_HEADROOM);
        self.imaginary = self.imaginary.max(point.im.abs() * BOUND_HEADROOM);
    }
}

/// Draw state handed to the sink once per time step.
#[derive(Debug, Copy, Clone)]
pub struct Frame<'a> {
    /// Time step `i`, in `0..=N`.
    pub index: usize,
    pub sample_count: usize,
    pub circle_count: usize,
    pub time: f64,

    /// `Running` while drawing and saving frames, `Complete` when saving the final image.
    pub phase: DriverState,
    pub state: &'a ReconstructionState,
    pub history: &'a AnimationHistory,
    pub bounds: AxisBounds,
}

impl Frame<'_> {
    /// True on the step that closes the loop.
    pub fn is_last(&self) -> bool {
        self.index == self.sample_count
    }
}

/// Consumes frames in order. Every call completes before the next frame is computed.
pub trait PresentationSink {
    fn draw(&mut self, frame: &Frame) -> Result<()>;

    /// Called after `draw` for each frame when [`RunConfig::save_frames`] is set.
    fn persist_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Called once after the last frame when [`RunConfig::save_final`] is set.
    fn persist_final(&mut self, frame: &Frame) -> Result<()>;
}

impl<S: PresentationSink + ?Sized> PresentationSink for &mut S {
    fn draw(&mut self, frame: &Frame) -> Result<()> {
        (**self).draw(frame)
    }

    fn persist_frame(&mut self, frame: &Frame) -> Result<()> {
        (**self).persist_frame(frame)
    }

    fn persist_final(&mut self, frame: &Frame) -> Result<()> {
        (**self).persist_final(frame)
    }
}

/// Idle between runs. Sinks observe `Running` and `Complete` through [`Frame::phase`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running { circles: usize },
    Complete,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RunSummary {
    pub circles: usize,
    pub frames: usize,
    pub final_point: Sample,
    pub bounds: AxisBounds,
}

/// Owns the history of one run at a time. Holds nothing across runs.
#[derive(Debug)]
pub struct AnimationDriver {
    state: DriverState,
    history: AnimationHistory,
}

impl Default for AnimationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationDriver {
    pub fn new() -> AnimationDriver {
        AnimationDriver {
            state: DriverState::Idle,
            history: AnimationHistory::default(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn history(&self) -> &AnimationHistory {
        &self.history
    }

    /// Runs frames `0..=N` for one truncation, then returns to idle.
    ///
    /// On any failure the partial history is discarded and the driver is idle again.
    /// An invalid truncation is rejected before the sink sees a single frame.
    pub fn start<S: PresentationSink>(
        &mut self,
        trajectory: &Trajectory,
        config: &RunConfig,
        mut sink: S,
    ) -> Result<RunSummary> {
        self.history.clear();
        self.state = DriverState::Running {
            circles: config.circles,
        };

        let result = self.sweep(trajectory, config, &mut sink);

        self.history.clear();
        self.state = DriverState::Idle;
        result
    }

    fn sweep(
        &mut self,
        trajectory: &Trajectory,
        config: &RunConfig,
        sink: &mut dyn PresentationSink,
    ) -> Result<RunSummary> {
        let spectrum = decompose(trajectory)?;
        check_truncation(&spectrum, config.circles)?;

        let n = spectrum.len();
        let k = config.circles;
        let mut bounds = AxisBounds::new(trajectory, &spectrum);
        debug!(samples = n, circles = k, "animation run started");

        let mut last = None;
        for i in 0..=n {
            let state = reconstruct_at(&spectrum, i, k)?;
            let time = time_at(i, n);
            let endpoint = state.endpoint();

            self.history.push(time, endpoint);
            bounds.observe(endpoint);

            let frame = Frame {
                index: i,
                sample_count: n,
                circle_count: k,
                time,
                phase: self.state,
                state: &state,
                history: &self.history,
                bounds,
            };
            sink.draw(&frame)
                .with_context(|| format!("drawing frame {} of {} circles", i, k))?;
            if config.save_frames {
                sink.persist_frame(&frame)
                    .with_context(|| format!("saving frame {} of {} circles", i, k))?;
            }
            last = Some(state);
        }

        self.state = DriverState::Complete;
        // 0..=n is never empty.
        let last = last.context("run produced no frames")?;
        if config.save_final {
            let frame = Frame {
                index: n,
                sample_count: n,
                circle_count: k,
                time: time_at(n, n),
                phase: self.state,
                state: &last,
                history: &self.history,
                bounds,
            };
            sink.persist_final(&frame)
                .with_context(|| format!("saving final image of {} circles", k))?;
        }

        let summary = RunSummary {
            circles: k,
            frames: self.history.len(),
            final_point: last.endpoint(),
            bounds,
        };
        debug!(circles = k, frames = summary.frames, "animation run complete");
        Ok(summary)
    }
}
