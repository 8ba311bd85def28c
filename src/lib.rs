//! Fourier epicycles: decompose a closed curve into ranked rotating circles
//! and replay their truncated sum one frame at a time.

pub mod common;
pub mod driver;
pub mod epicycle;
pub mod error;
pub mod fft;
pub mod logging;
pub mod renderer;
pub mod trajectory;

pub use driver::{AnimationDriver, AnimationHistory, Frame, PresentationSink, RunConfig, RunSummary};
pub use epicycle::{reconstruct_at, ReconstructionState};
pub use error::EpicycleError;
pub use fft::{decompose, FrequencyComponent, RankedSpectrum};
pub use trajectory::{Trajectory, TrajectorySource};
