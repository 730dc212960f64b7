use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use log::{debug, warn};
use ndarray::{Array2, ArrayView1};
use once_cell::sync::Lazy;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use crate::config::RenderSettings;
use crate::ecg::error::EcgError;
use crate::ecg::grid::{AxisTicks, CellSpec, GridLayout, GridStyle, GRID_COLS, GRID_ROWS};
use crate::ecg::waveform::{time_axis, WaveformMatrix};
type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type Plot<'a> = DrawingArea<BitMapBackend<'a>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;
// Text needs a system sans-serif font; without one the grid is still drawn.
static TEXT_AVAILABLE: Lazy<bool> = Lazy::new(|| {
    match FontDesc::new(FontFamily::SansSerif, 12.0, FontStyle::Bold).box_size("aVR") {
        Ok(_) => true,
        Err(err) => {
            warn!("no usable sans-serif font ({err:?}); lead labels and title will be omitted");
            false
        }
    }
});
/// Renders 12-lead waveforms onto the clinical 6x2 grid and encodes the result as PNG.
///
/// Every call owns its pixel buffer and drawing area, so concurrent renders
/// never share canvas state and nothing outlives the call.
#[derive(Clone, Debug, Default)]
pub struct ClinicalGridRenderer {
    settings: RenderSettings,
}
impl ClinicalGridRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }
    /// Renders at the configured default sampling rate.
    pub fn render(&self, samples: Array2<f64>) -> Result<Vec<u8>, EcgError> {
        self.render_at(samples, self.settings.sampling_rate_hz)
    }
    pub fn render_at(&self, samples: Array2<f64>, sample_rate_hz: f64) -> Result<Vec<u8>, EcgError> {
        let matrix = WaveformMatrix::new(samples)?;
        self.render_styled(&matrix, sample_rate_hz, &GridStyle::default())
    }
    pub fn render_styled(
        &self,
        matrix: &WaveformMatrix,
        sample_rate_hz: f64,
        style: &GridStyle,
    ) -> Result<Vec<u8>, EcgError> {
        let layout = GridLayout::new(matrix.sample_count(), sample_rate_hz, &self.settings, style)?;
        let (width, height) = layout.canvas_px();
        debug!(
            "rendering {} samples ({:.3}s) onto {}x{} px canvas",
            matrix.sample_count(),
            layout.duration_seconds(),
            width,
            height
        );
        let time = time_axis(matrix.sample_count(), layout.duration_seconds());
        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE)?;
            let margin = layout.strokes().outer_margin;
            let inner = root.margin(margin, margin, margin, margin);
            let (title_area, grid_area) = inner.split_vertically(layout.title_band_px());
            if *TEXT_AVAILABLE {
                draw_title(&title_area, &layout)?;
            }
            let cells = grid_area.split_evenly((GRID_ROWS, GRID_COLS));
            for (cell, area) in layout.cells().iter().zip(cells.iter()) {
                let samples = matrix.lead(cell.lead);
                draw_lead(area, cell, &layout, time.view(), samples)?;
            }
            root.present()?;
        }
        encode_png(buffer, width, height)
    }
}
fn draw_title(area: &Canvas<'_>, layout: &GridLayout) -> Result<(), EcgError> {
    let (width, height) = area.dim_in_pixel();
    let style = FontDesc::new(
        FontFamily::SansSerif,
        f64::from(layout.strokes().title_font),
        FontStyle::Bold,
    )
    .color(&BLACK)
    .pos(Pos::new(HPos::Center, VPos::Center));
    area.draw_text(
        &layout.style().title,
        &style,
        ((width / 2) as i32, (height / 2) as i32),
    )?;
    Ok(())
}
fn draw_lead(
    area: &Canvas<'_>,
    cell: &CellSpec,
    layout: &GridLayout,
    time: ArrayView1<'_, f64>,
    samples: ArrayView1<'_, f64>,
) -> Result<(), EcgError> {
    let strokes = layout.strokes();
    let (label_area, plot_area) = area.split_horizontally(layout.label_column_px());
    if *TEXT_AVAILABLE {
        let (width, height) = label_area.dim_in_pixel();
        let style = FontDesc::new(
            FontFamily::SansSerif,
            f64::from(strokes.label_font),
            FontStyle::Bold,
        )
        .color(&BLACK)
        .pos(Pos::new(HPos::Right, VPos::Center));
        // label_pad points left of the plot frame
        let x = (width + strokes.cell_margin) as i32 - strokes.label_pad as i32;
        label_area.draw_text(cell.lead.label(), &style, (x, (height / 2) as i32))?;
    }
    let (x0, x1) = (cell.x_range.start, cell.x_range.end);
    let (y0, y1) = (cell.y_range.start, cell.y_range.end);
    let mut chart = ChartBuilder::on(&plot_area)
        .margin(strokes.cell_margin)
        .build_cartesian_2d(cell.x_range.clone(), cell.y_range.clone())?;
    let ticks = layout.ticks();
    draw_minor_grid(chart.plotting_area(), ticks, (x0, y0), strokes.minor_grid)?;
    let major = RED.stroke_width(strokes.major_grid);
    chart.draw_series(
        ticks
            .x_major
            .iter()
            .map(|&x| PathElement::new(vec![(x, y0), (x, y1)], major)),
    )?;
    chart.draw_series(
        ticks
            .y_major
            .iter()
            .map(|&y| PathElement::new(vec![(x0, y), (x1, y)], major)),
    )?;
    for run in trace_runs(time, samples, y0, y1) {
        chart.draw_series(LineSeries::new(run, BLACK.stroke_width(strokes.trace)))?;
    }
    chart.plotting_area().draw(&Rectangle::new(
        [(x0, y0), (x1, y1)],
        BLACK.stroke_width(strokes.major_grid),
    ))?;
    Ok(())
}
/// Stamps the dotted minor gridlines straight onto the plot's pixels:
/// `dot_px` square dots separated by twice that gap.
fn draw_minor_grid(
    plot: &Plot<'_>,
    ticks: &AxisTicks,
    origin: (f64, f64),
    dot_px: u32,
) -> Result<(), EcgError> {
    let (left, top) = plot.get_base_pixel();
    let (width, height) = plot.dim_in_pixel();
    let (width, height) = (width as i32, height as i32);
    let pixels = plot.strip_coord_spec();
    let dot = dot_px.max(1) as i32;
    let period = (dot * 3) as usize;
    let stamp = |x: i32, y: i32| -> Result<(), EcgError> {
        for dx in 0..dot {
            for dy in 0..dot {
                let (px, py) = (x + dx - dot / 2, y + dy - dot / 2);
                if (0..width).contains(&px) && (0..height).contains(&py) {
                    pixels.draw_pixel((px, py), &RED)?;
                }
            }
        }
        Ok(())
    };
    for &x in &ticks.x_minor {
        let column = plot.map_coordinate(&(x, origin.1)).0 - left;
        for y in (0..height).step_by(period) {
            stamp(column, y)?;
        }
    }
    for &y in &ticks.y_minor {
        let row = plot.map_coordinate(&(origin.0, y)).1 - top;
        for x in (0..width).step_by(period) {
            stamp(x, row)?;
        }
    }
    Ok(())
}
/// Cuts the trace into the polylines that are actually visible: a gap at
/// every non-finite sample, and each segment leaving `[y0, y1]` is cut
/// where it crosses the edge.
fn trace_runs(
    time: ArrayView1<'_, f64>,
    samples: ArrayView1<'_, f64>,
    y0: f64,
    y1: f64,
) -> Vec<Vec<(f64, f64)>> {
    let points: Vec<(f64, f64)> = time.iter().copied().zip(samples.iter().copied()).collect();
    let mut runs = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for pair in points.windows(2) {
        match clip_segment(pair[0], pair[1], y0, y1) {
            Some((start, end)) => {
                if current.last() != Some(&start) {
                    if current.len() > 1 {
                        runs.push(std::mem::take(&mut current));
                    }
                    current = vec![start];
                }
                current.push(end);
            }
            None if current.len() > 1 => runs.push(std::mem::take(&mut current)),
            None => current.clear(),
        }
    }
    if current.len() > 1 {
        runs.push(current);
    }
    runs
}
fn clip_segment(
    a: (f64, f64),
    b: (f64, f64),
    y0: f64,
    y1: f64,
) -> Option<((f64, f64), (f64, f64))> {
    if ![a.0, a.1, b.0, b.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let inside = |y: f64| (y0..=y1).contains(&y);
    if inside(a.1) && inside(b.1) {
        return Some((a, b));
    }
    let dy = b.1 - a.1;
    if dy == 0.0 {
        return None;
    }
    let (s0, s1) = ((y0 - a.1) / dy, (y1 - a.1) / dy);
    let enter = s0.min(s1).max(0.0);
    let leave = s0.max(s1).min(1.0);
    if enter > leave {
        return None;
    }
    // 端点在范围内时原样保留, 相邻线段才能首尾相接
    let at = |s: f64| match s {
        s if s <= 0.0 => a,
        s if s >= 1.0 => b,
        s => (a.0 + s * (b.0 - a.0), (a.1 + s * dy).clamp(y0, y1)),
    };
    Some((at(enter), at(leave)))
}
fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, EcgError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer)
        .ok_or_else(|| EcgError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
