// src/visualization/plotter.rs

use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

use super::{PlotConfig, TracePlot};
use crate::error::ProcessingError;

const MARGIN: u32 = 20;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TRACE: Rgb<u8> = Rgb([31, 119, 180]);
const THRESHOLD: Rgb<u8> = Rgb([44, 160, 44]);
const ONSET: Rgb<u8> = Rgb([214, 39, 40]);

/// Writes photodiode QA plots as PNGs into one directory, up to `max_plots` per run.
pub struct DiagnosticPlotter {
    config: PlotConfig,
    dir: PathBuf,
    subject: String,
    written: usize,
}

impl DiagnosticPlotter {
    pub fn new<P: AsRef<Path>>(dir: P, subject: &str, config: PlotConfig) -> Self {
        Self {
            config,
            dir: dir.as_ref().to_path_buf(),
            subject: subject.to_string(),
            written: 0,
        }
    }

    /// Plots land in `<root>/<subject>/figures/PD_Shift/`.
    pub fn for_subject<P: AsRef<Path>>(root: P, subject: &str, config: PlotConfig) -> Self {
        let dir = root
            .as_ref()
            .join(subject)
            .join("figures")
            .join("PD_Shift");
        Self::new(dir, subject, config)
    }

    pub fn trace_len(&self) -> usize {
        self.config.trace_len
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn is_full(&self) -> bool {
        self.written >= self.config.max_plots
    }

    /// Renders the plot for event number `event_index`. Returns the file written, or
    /// `None` once the cap is reached.
    pub fn plot(
        &mut self,
        event_index: usize,
        plot: &TracePlot<'_>,
    ) -> Result<Option<PathBuf>, ProcessingError> {
        if self.is_full() {
            return Ok(None);
        }
        fs::create_dir_all(&self.dir)?;

        let path = self
            .dir
            .join(format!("{}_{}.png", self.subject, event_index));
        render(plot, self.config.width, self.config.height).save(&path)?;
        self.written += 1;

        log::debug!(
            "Plotted event {} (shift {} samples) to {}",
            event_index,
            plot.onset,
            path.display()
        );
        Ok(Some(path))
    }
}

/// Line plot of the trace with the threshold as a horizontal line and the onset as a
/// vertical line.
pub fn render(plot: &TracePlot<'_>, width: u32, height: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    let plot_w = width.saturating_sub(2 * MARGIN).max(1);
    let plot_h = height.saturating_sub(2 * MARGIN).max(1);

    let (mut lo, mut hi) = plot
        .trace
        .iter()
        .fold((plot.threshold, plot.threshold), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !(hi - lo).is_finite() || hi - lo <= f64::EPSILON {
        lo -= 0.5;
        hi += 0.5;
    }
    let pad = (hi - lo) * 0.05;
    let (lo, hi) = (lo - pad, hi + pad);

    let n = plot.trace.len().max(2);
    let x_of = |i: usize| MARGIN as i64 + (i as f64 * (plot_w - 1) as f64 / (n - 1) as f64) as i64;
    let y_of = |v: f64| {
        let frac = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
        MARGIN as i64 + ((1.0 - frac) * (plot_h - 1) as f64).round() as i64
    };

    // Threshold, dashed.
    let y = y_of(plot.threshold);
    for x in (MARGIN as i64..(MARGIN + plot_w) as i64).filter(|x| (x / 6) % 2 == 0) {
        put(&mut img, x, y, THRESHOLD);
    }

    // Onset, dashed.
    let x = x_of(plot.onset.min(n - 1));
    for y in (MARGIN as i64..(MARGIN + plot_h) as i64).filter(|y| (y / 6) % 2 == 0) {
        put(&mut img, x, y, ONSET);
    }

    for (i, pair) in plot.trace.windows(2).enumerate() {
        draw_line(
            &mut img,
            (x_of(i), y_of(pair[0])),
            (x_of(i + 1), y_of(pair[1])),
            TRACE,
        );
    }
    img
}

fn put(img: &mut RgbImage, x: i64, y: i64, colour: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, colour);
    }
}

// Bresenham
fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), colour: Rgb<u8>) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(img, x0, y0, colour);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
