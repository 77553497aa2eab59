//! Log-log PNG rendering of the per-region fits.

use font8x8::legacy::BASIC_LEGACY;
use image::{Rgb, RgbImage};
use sfd_core::{PlotRequest, PlotSeries, Visualizer};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([215, 215, 215]);
const CSFD: Rgb<u8> = Rgb([220, 30, 30]);
const FD: Rgb<u8> = Rgb([30, 60, 220]);

// ── Axes ──────────────────────────────────────────────────────────────────────

/// Maps data coordinates onto the plot area of a `width`×`height` image,
/// decade-aligned on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogAxes {
    /// log10 bounds, whole decades.
    pub x_decades: (i32, i32),
    pub y_decades: (i32, i32),
    pub width: u32,
    pub height: u32,
    pub margin: u32,
}

fn decade_span(values: impl Iterator<Item = f64>) -> (i32, i32) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        let l = v.log10();
        (lo.min(l), hi.max(l))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return (0, 1);
    }
    let (lo, hi) = (lo.floor() as i32, hi.ceil() as i32);
    if lo == hi {
        (lo, hi + 1)
    } else {
        (lo, hi)
    }
}

impl LogAxes {
    pub fn fit(points: &[(f64, f64)], width: u32, height: u32, margin: u32) -> Self {
        Self {
            x_decades: decade_span(points.iter().map(|p| p.0)),
            y_decades: decade_span(points.iter().map(|p| p.1)),
            width,
            height,
            margin,
        }
    }

    /// Pixel position of a data point; y grows downward.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let m = self.margin as f64;
        let w = self.width as f64 - 2.0 * m;
        let h = self.height as f64 - 2.0 * m;
        let (x0, x1) = (self.x_decades.0 as f64, self.x_decades.1 as f64);
        let (y0, y1) = (self.y_decades.0 as f64, self.y_decades.1 as f64);
        let px = m + (x.log10() - x0) / (x1 - x0) * w;
        let py = self.height as f64 - m - (y.log10() - y0) / (y1 - y0) * h;
        (px, py)
    }
}

// ── Raster helpers ────────────────────────────────────────────────────────────

fn put(img: &mut RgbImage, x: i64, y: i64, c: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, c);
    }
}

/// Bresenham line, `thickness` pixels square brush.
fn line(img: &mut RgbImage, a: (f64, f64), b: (f64, f64), c: Rgb<u8>, thickness: i64) {
    let (mut x0, mut y0) = (a.0.round() as i64, a.1.round() as i64);
    let (x1, y1) = (b.0.round() as i64, b.1.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let r = thickness / 2;
    loop {
        for ox in -r..=r {
            for oy in -r..=r {
                put(img, x0 + ox, y0 + oy, c);
            }
        }
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

/// 8×8 bitmap text, each glyph pixel drawn as a `scale`×`scale` block.
/// Non-ASCII characters render as '?'. Returns the drawn width in pixels.
fn text(img: &mut RgbImage, x: i64, y: i64, s: &str, c: Rgb<u8>, scale: i64) -> i64 {
    let mut pen = x;
    for ch in s.chars() {
        let glyph: [u8; 8] = BASIC_LEGACY.get(ch as usize).copied().unwrap_or(BASIC_LEGACY[b'?' as usize]);
        for (row, &bits) in glyph.iter().enumerate() {
            for col in 0..8i64 {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        put(img, pen + col * scale + dx, y + row as i64 * scale + dy, c);
                    }
                }
            }
        }
        pen += 8 * scale;
    }
    pen - x
}

fn text_width(s: &str, scale: i64) -> i64 {
    s.chars().count() as i64 * 8 * scale
}

fn title(series: &PlotSeries) -> String {
    format!("Region {} ({})", series.name, series.label)
}

fn legend(series: &PlotSeries) -> [(String, Rgb<u8>); 2] {
    [
        (format!("CSFD power-law, b-val = {:.3}", series.csfd_b), CSFD),
        (format!("FD power-law, b-val = {:.3}", series.fd_b), FD),
    ]
}

// ── Plotter ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct PngPlotter {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
}

impl Default for PngPlotter {
    fn default() -> Self {
        Self { width: 800, height: 600, margin: 50 }
    }
}

impl PngPlotter {
    pub fn draw(&self, series: &PlotSeries) -> RgbImage {
        let csfd = PlotSeries::log_points(&series.csfd_x, &series.csfd_y);
        let fd = PlotSeries::log_points(&series.fd_x, &series.fd_y);
        let all: Vec<(f64, f64)> = csfd.iter().chain(fd.iter()).copied().collect();
        let axes = LogAxes::fit(&all, self.width, self.height, self.margin);

        let mut img = RgbImage::from_pixel(self.width, self.height, WHITE);
        let m = self.margin as f64;
        let (left, right) = (m, self.width as f64 - m);
        let (top, bottom) = (m, self.height as f64 - m);

        for d in axes.x_decades.0..=axes.x_decades.1 {
            let (px, _) = axes.to_pixel(10f64.powi(d), 1.0);
            line(&mut img, (px, top), (px, bottom), GRID, 1);
        }
        for d in axes.y_decades.0..=axes.y_decades.1 {
            let (_, py) = axes.to_pixel(1.0, 10f64.powi(d));
            line(&mut img, (left, py), (right, py), GRID, 1);
        }

        for (pts, colour) in [(&fd, FD), (&csfd, CSFD)] {
            let pixels: Vec<(f64, f64)> = pts.iter().map(|&(x, y)| axes.to_pixel(x, y)).collect();
            for pair in pixels.windows(2) {
                line(&mut img, pair[0], pair[1], colour, 2);
            }
            if let [only] = pixels.as_slice() {
                line(&mut img, *only, *only, colour, 4);
            }
        }

        // Frame last so curves never cover it.
        line(&mut img, (left, top), (right, top), BLACK, 1);
        line(&mut img, (left, bottom), (right, bottom), BLACK, 1);
        line(&mut img, (left, top), (left, bottom), BLACK, 1);
        line(&mut img, (right, top), (right, bottom), BLACK, 1);

        // Decade tick labels.
        for d in axes.x_decades.0..=axes.x_decades.1 {
            let label = format!("1e{d}");
            let (px, _) = axes.to_pixel(10f64.powi(d), 1.0);
            text(&mut img, px.round() as i64 - text_width(&label, 1) / 2, bottom as i64 + 6, &label, BLACK, 1);
        }
        for d in axes.y_decades.0..=axes.y_decades.1 {
            let label = format!("1e{d}");
            let (_, py) = axes.to_pixel(1.0, 10f64.powi(d));
            text(&mut img, left as i64 - 6 - text_width(&label, 1), py.round() as i64 - 4, &label, BLACK, 1);
        }

        let w = self.width as i64;
        let heading = title(series);
        text(&mut img, (w - text_width(&heading, 2)) / 2, 8, &heading, BLACK, 2);
        text(&mut img, left as i64, top as i64 - 14, "Count", BLACK, 1);
        let x_label = "Diameter";
        text(&mut img, (w - text_width(x_label, 1)) / 2, bottom as i64 + 20, x_label, BLACK, 1);

        // Legend, top right inside the frame.
        let entries = legend(series);
        let longest = entries.iter().map(|(t, _)| text_width(t, 1)).max().unwrap_or(0);
        let x0 = right as i64 - longest - 40;
        for (i, (label, colour)) in entries.iter().enumerate() {
            let y = top as i64 + 10 + i as i64 * 16;
            for row in y - 2..y + 10 {
                for col in x0 - 4..right as i64 - 4 {
                    put(&mut img, col, row, WHITE);
                }
            }
            line(&mut img, (x0 as f64, y as f64 + 4.0), (x0 as f64 + 20.0, y as f64 + 4.0), *colour, 2);
            text(&mut img, x0 + 28, y, label, BLACK, 1);
        }
        img
    }
}

impl Visualizer for PngPlotter {
    type Error = image::ImageError;

    fn plot(&mut self, request: &PlotRequest) -> Result<(), Self::Error> {
        self.draw(&request.series).save(&request.path)
    }
}
