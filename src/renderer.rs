use crate::common::TAU;
use crate::driver::{Frame, PresentationSink};
use anyhow::{anyhow, Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fmt;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::debug;

/// Points per circle outline.
const CIRCLE_SEGMENTS: usize = 96;

const TRACER_WIDTH: u32 = 3;
const PROJECTION_WIDTH: u32 = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(format!("unknown theme {}, expected light or dark", s)),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        })
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Palette {
    pub background: RGBColor,
    pub path: RGBColor,
    pub circles: RGBAColor,
    pub axes: RGBAColor,
}

impl Theme {
    pub fn palette(self) -> Palette {
        match self {
            Theme::Light => Palette {
                background: RGBColor(0xFF, 0xFF, 0xFF),
                path: RGBColor(0xFF, 0x57, 0x33),
                circles: RGBAColor(0x00, 0x00, 0x00, 0.2),
                axes: RGBAColor(0x00, 0x00, 0x00, 0.5),
            },
            Theme::Dark => Palette {
                background: RGBColor(0x00, 0x00, 0x00),
                path: RGBColor(0x00, 0xFF, 0xFF),
                circles: RGBAColor(0xFF, 0xFF, 0xFF, 0.2),
                axes: RGBAColor(0xFF, 0xFF, 0xFF, 0.5),
            },
        }
    }
}

/// Where and how [`ImageSink`] writes.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub out_dir: PathBuf,
    pub theme: Theme,
    pub width: u32,
    pub height: u32,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig {
            out_dir: PathBuf::from("."),
            theme: Theme::Light,
            width: 1600,
            height: 800,
        }
    }
}

/// `Renders--{N}Samples--{K}Circle/{N}S-{K}C--{i:03}.png`
pub fn frame_path(out_dir: &Path, samples: usize, circles: usize, index: usize) -> PathBuf {
    out_dir
        .join(format!("Renders--{}Samples--{}Circle", samples, circles))
        .join(format!("{}S-{}C--{:03}.png", samples, circles, index))
}

/// `EndResults--{N}Samples/{K:03}C.png`
pub fn final_path(out_dir: &Path, samples: usize, circles: usize) -> PathBuf {
    out_dir
        .join(format!("EndResults--{}Samples", samples))
        .join(format!("{:03}C.png", circles))
}

fn plot_err<E: fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("plot error: {}", err)
}

fn margin_of<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>) -> i32 {
    let (w, h) = area.dim_in_pixel();
    (w.min(h) / 16) as i32
}

/// Zero-width ranges make the coordinate mapping degenerate.
fn half_range(bound: f64) -> f64 {
    if bound > 0. {
        bound
    } else {
        1.
    }
}

/// Renders the epicycle plane on the left and the real/imaginary traces on the right.
pub fn draw_frame<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    frame: &Frame,
    palette: &Palette,
) -> Result<()> {
    root.fill(&palette.background).map_err(plot_err)?;

    let (width, height) = root.dim_in_pixel();
    let (left, right) = root.split_horizontally((width as f64 * 0.618) as i32);

    // Keep the plane square.
    let (left_w, _) = left.dim_in_pixel();
    let side = left_w.min(height);
    let plane = left.shrink(
        (((left_w - side) / 2) as i32, ((height - side) / 2) as i32),
        (side as i32, side as i32),
    );
    draw_plane(&plane, frame, palette)?;

    let views = right.split_evenly((2, 1));
    draw_projection(&views[0], frame.history.real(), frame.bounds.real, palette)?;
    draw_projection(&views[1], frame.history.imaginary(), frame.bounds.imaginary, palette)?;
    Ok(())
}

fn draw_plane<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    frame: &Frame,
    palette: &Palette,
) -> Result<()> {
    let r = half_range(frame.bounds.plane);
    let mut chart = ChartBuilder::on(area)
        .margin(margin_of(area))
        .build_cartesian_2d(-r..r, -r..r)
        .map_err(plot_err)?;

    chart
        .draw_series(vec![
            PathElement::new(vec![(-r, 0.), (r, 0.)], &palette.axes),
            PathElement::new(vec![(0., -r), (0., r)], &palette.axes),
        ])
        .map_err(plot_err)?;

    chart
        .draw_series(frame.state.circles().map(|circle| {
            let outline = circle
                .outline(CIRCLE_SEGMENTS)
                .map(|z| (z.re, z.im))
                .collect::<Vec<_>>();
            PathElement::new(outline, &palette.circles)
        }))
        .map_err(plot_err)?;

    let chain = frame.state.centers().iter().map(|z| (z.re, z.im)).collect::<Vec<_>>();
    chart
        .draw_series(std::iter::once(PathElement::new(chain, &palette.circles)))
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            frame.history.tracer().iter().map(|p| (p.point.re, p.point.im)),
            palette.path.stroke_width(TRACER_WIDTH),
        ))
        .map_err(plot_err)?;
    Ok(())
}

fn draw_projection<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    samples: &[(f64, f64)],
    bound: f64,
    palette: &Palette,
) -> Result<()> {
    let r = half_range(bound);
    let mut chart = ChartBuilder::on(area)
        .margin(margin_of(area))
        .build_cartesian_2d(0f64..TAU, -r..r)
        .map_err(plot_err)?;

    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(0., 0.), (TAU, 0.)],
            &palette.axes,
        )))
        .map_err(plot_err)?;
    chart
        .draw_series(LineSeries::new(
            samples.iter().copied(),
            palette.path.stroke_width(PROJECTION_WIDTH),
        ))
        .map_err(plot_err)?;
    Ok(())
}

/// Writes PNG images of frames. Draw calls alone produce no output.
pub struct ImageSink {
    config: SinkConfig,
    palette: Palette,
}

impl ImageSink {
    pub fn new(config: SinkConfig) -> ImageSink {
        let palette = config.theme.palette();
        ImageSink { config, palette }
    }

    fn save(&self, frame: &Frame, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let root =
            BitMapBackend::new(path, (self.config.width, self.config.height)).into_drawing_area();
        draw_frame(&root, frame, &self.palette)?;
        root.present()
            .map_err(plot_err)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = %path.display(), "saved frame");
        Ok(())
    }
}

impl PresentationSink for ImageSink {
    fn draw(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }

    fn persist_frame(&mut self, frame: &Frame) -> Result<()> {
        let path = frame_path(
            &self.config.out_dir,
            frame.sample_count,
            frame.circle_count,
            frame.index,
        );
        self.save(frame, &path)
    }

    fn persist_final(&mut self, frame: &Frame) -> Result<()> {
        let path = final_path(&self.config.out_dir, frame.sample_count, frame.circle_count);
        self.save(frame, &path)
    }
}

/// Spaces out `draw` calls to at most one per `interval`.
pub struct PacedSink<S> {
    inner: S,
    interval: Duration,
    last_draw: Option<Instant>,
}

impl<S: PresentationSink> PacedSink<S> {
    pub fn new(inner: S, interval: Duration) -> PacedSink<S> {
        PacedSink {
            inner,
            interval,
            last_draw: None,
        }
    }

    /// Fails when `1 / fps` is not a representable duration.
    pub fn from_fps(inner: S, fps: f64) -> Result<PacedSink<S>> {
        let interval = Duration::try_from_secs_f64(1. / fps)
            .with_context(|| format!("invalid frame rate {}", fps))?;
        Ok(Self::new(inner, interval))
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: PresentationSink> PresentationSink for PacedSink<S> {
    fn draw(&mut self, frame: &Frame) -> Result<()> {
        if let Some(last) = self.last_draw {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                spin_sleep::sleep(self.interval - elapsed);
            }
        }
        self.last_draw = Some(Instant::now());
        self.inner.draw(frame)
    }

    fn persist_frame(&mut self, frame: &Frame) -> Result<()> {
        self.inner.persist_frame(frame)
    }

    fn persist_final(&mut self, frame: &Frame) -> Result<()> {
        self.inner.persist_final(frame)
    }
}
