use anyhow::{Context, Error, Result};
use epicycles::driver::{AnimationDriver, RunConfig};
use epicycles::fft::{decompose, RankedSpectrum};
use epicycles::logging::init_tracing;
use epicycles::renderer::{ImageSink, PacedSink, SinkConfig, Theme};
use epicycles::trajectory::{ParametricSource, PointFileSource, Shape, TrajectorySource};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use tracing::{info, warn};

const MIN_SAMPLES: usize = 2;
const MAX_SAMPLES: usize = 65536;

/// Slowest nonzero frame rate.
const MIN_FPS: f64 = 0.01;

fn parse_sample_count(src: &str) -> Result<usize> {
    let num: usize = src
        .parse()
        .map_err(|_| Error::msg(format!("Sample count {} must be an integer", src)))?;

    if num > MAX_SAMPLES {
        return Err(Error::msg(format!(
            "Sample count {} must be <= {}",
            num, MAX_SAMPLES
        )));
    }
    if num < MIN_SAMPLES {
        return Err(Error::msg(format!(
            "Sample count {} must be >= {}",
            num, MIN_SAMPLES
        )));
    }
    Ok(num)
}

fn parse_circle_count(src: &str) -> Result<usize> {
    let num: usize = src
        .parse()
        .map_err(|_| Error::msg(format!("Circle count {} must be an integer", src)))?;
    if num == 0 {
        return Err(Error::msg("Circle count must be >= 1"));
    }
    Ok(num)
}

fn parse_fps(src: &str) -> Result<f64> {
    let fps: f64 = src
        .parse()
        .map_err(|_| Error::msg(format!("Frame rate {} must be a number", src)))?;
    if !fps.is_finite() || fps < 0. {
        return Err(Error::msg(format!("Frame rate {} must be >= 0", src)));
    }
    if fps > 0. && fps < MIN_FPS {
        return Err(Error::msg(format!(
            "Frame rate {} must be 0 or >= {}",
            src, MIN_FPS
        )));
    }
    Ok(fps)
}

/// Fourier epicycle animator
#[derive(StructOpt, Debug)]
#[structopt(name = "epicycles")]
pub struct Opt {
    /// Number of points sampled along the curve, and the transform length.
    #[structopt(short = "n", long, default_value = "256", parse(try_from_str = parse_sample_count))]
    samples: usize,

    /// Animate a single truncation with this many circles.
    /// Overrides --circles-from and --circles-to.
    #[structopt(short = "k", long, parse(try_from_str = parse_circle_count))]
    circles: Option<usize>,

    /// First circle count of the sweep.
    #[structopt(long, default_value = "48", parse(try_from_str = parse_circle_count))]
    circles_from: usize,

    /// Last circle count of the sweep, inclusive.
    /// Clamped to the sample count.
    #[structopt(long, default_value = "63", parse(try_from_str = parse_circle_count))]
    circles_to: usize,

    /// Built-in curve to trace.
    #[structopt(short, long, default_value = "butterfly", possible_values = Shape::NAMES)]
    shape: Shape,

    /// Angular frequency of the harmonic shape.
    #[structopt(long, default_value = "5")]
    harmonic: i64,

    /// JSON file holding a closed polyline as [[x, y], ...].
    /// Takes precedence over --shape.
    #[structopt(long, parse(from_os_str))]
    points: Option<PathBuf>,

    /// Treat --points as y-up instead of screen coordinates.
    #[structopt(long)]
    keep_y: bool,

    /// Save every frame as a numbered image.
    #[structopt(long)]
    save_frames: bool,

    /// Do not save the last frame of each run.
    #[structopt(long)]
    no_save_final: bool,

    /// Directory receiving saved images.
    #[structopt(short, long, default_value = ".", parse(from_os_str))]
    out_dir: PathBuf,

    #[structopt(long, default_value = "light", possible_values = &["light", "dark"])]
    theme: Theme,

    /// Image width in pixels.
    #[structopt(long, default_value = "1600")]
    width: u32,

    /// Image height in pixels.
    #[structopt(long, default_value = "800")]
    height: u32,

    /// Upper bound on frames saved per second with --save-frames.
    /// 0 renders as fast as possible.
    #[structopt(long, default_value = "0", parse(try_from_str = parse_fps))]
    fps: f64,

    /// Write the ranked spectrum to this JSON file.
    #[structopt(long, parse(from_os_str))]
    spectrum_json: Option<PathBuf>,
}

impl Opt {
    fn parse_validate(&mut self) -> Result<()> {
        if self.circles.is_none() && self.circles_from > self.circles_to {
            return Err(Error::msg(format!(
                "--circles-from {} must be <= --circles-to {}",
                self.circles_from, self.circles_to
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::msg(format!(
                "Image size {}x{} must be non-empty",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Circle counts to run, one animation each.
    ///
    /// A single --circles is passed through untouched and rejected later if too large.
    fn circle_range(&self) -> Result<RangeInclusive<usize>> {
        if let Some(k) = self.circles {
            return Ok(k..=k);
        }
        if self.circles_from > self.samples {
            return Err(Error::msg(format!(
                "--circles-from {} exceeds sample count {}",
                self.circles_from, self.samples
            )));
        }
        if self.circles_to > self.samples {
            warn!(
                requested = self.circles_to,
                samples = self.samples,
                "clamping circle sweep to sample count"
            );
        }
        Ok(self.circles_from..=self.circles_to.min(self.samples))
    }

    fn save_final(&self) -> bool {
        !self.no_save_final
    }

    /// Frame rate to hold, if any. Only frames that reach disk are paced.
    fn pacing(&self) -> Option<f64> {
        if self.save_frames && self.fps > 0. {
            Some(self.fps)
        } else {
            None
        }
    }

    fn run_config(&self, circles: usize) -> RunConfig {
        RunConfig {
            circles,
            save_frames: self.save_frames,
            save_final: self.save_final(),
        }
    }

    fn source(&self) -> Box<dyn TrajectorySource> {
        match &self.points {
            Some(path) => Box::new(PointFileSource {
                path: path.clone(),
                flip_y: !self.keep_y,
            }),
            None => Box::new(ParametricSource {
                shape: self.shape,
                harmonic: self.harmonic,
            }),
        }
    }
}

fn write_spectrum(path: &Path, spectrum: &RankedSpectrum) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &spectrum.records())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let mut opt = Opt::from_args();
    opt.parse_validate()?;
    init_tracing();

    let source = opt.source();
    let trajectory = source
        .sample(opt.samples)
        .with_context(|| format!("Failed to load trajectory from {}", source.name()))?;
    info!(source = %source.name(), samples = trajectory.len(), "trajectory ready");

    let spectrum = decompose(&trajectory)?;
    if let Some(path) = &opt.spectrum_json {
        write_spectrum(path, &spectrum)?;
        info!(path = %path.display(), "wrote spectrum");
    }

    if !opt.save_frames && !opt.save_final() {
        warn!("--no-save-final given without --save-frames, nothing will be written");
    }

    let mut sink = ImageSink::new(SinkConfig {
        out_dir: opt.out_dir.clone(),
        theme: opt.theme,
        width: opt.width,
        height: opt.height,
    });

    let mut driver = AnimationDriver::new();
    for circles in opt.circle_range()? {
        let config = opt.run_config(circles);
        let summary = if let Some(fps) = opt.pacing() {
            driver.start(&trajectory, &config, PacedSink::from_fps(&mut sink, fps)?)?
        } else {
            driver.start(&trajectory, &config, &mut sink)?
        };

        let mse = spectrum.mean_squared_error(&trajectory, circles)?;
        info!(
            circles,
            frames = summary.frames,
            mse,
            real_bound = summary.bounds.real,
            imaginary_bound = summary.bounds.imaginary,
            "animation finished"
        );
    }

    Ok(())
}
