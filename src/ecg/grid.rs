//! Geometry of the clinical 6x2 grid: canvas size, cell to lead mapping,
//! gridline positions and stroke sizes. Kept free of any drawing backend so
//! the layout can be checked without decoding pixels.
use std::ops::Range;
use crate::config::{DicomLayout, RenderSettings};
use crate::ecg::waveform::{duration_seconds, LeadName, LEAD_COUNT};
use crate::ecg::EcgError;
pub const GRID_ROWS: usize = 6;
pub const GRID_COLS: usize = 2;
pub const DEFAULT_TITLE: &str = "12-lead ECG";
/// 0.2 s is one large box at 25 mm/s.
pub const MAJOR_TIME_STEP: f64 = 0.2;
pub const MINOR_TIME_STEP: f64 = 0.04;
pub const MAJOR_AMPLITUDE_STEP: f64 = 0.5;
pub const MINOR_AMPLITUDE_STEP: f64 = 0.1;
const TRACE_WIDTH_PT: f64 = 1.0;
const MAJOR_GRID_WIDTH_PT: f64 = 0.5;
const MINOR_GRID_WIDTH_PT: f64 = 0.3;
const LABEL_FONT_PT: f64 = 12.0;
const LABEL_PAD_PT: f64 = 30.0;
const TITLE_FONT_PT: f64 = 16.0;
const OUTER_MARGIN_PT: f64 = 6.0;
const CELL_MARGIN_PT: f64 = 4.0;
#[derive(Clone, Debug, PartialEq)]
pub struct GridStyle {
    pub amplitude_mv: f64,
    pub minor_grid: bool,
    pub title: String,
}
impl Default for GridStyle {
    fn default() -> Self {
        Self {
            amplitude_mv: 2.0,
            minor_grid: true,
            title: DEFAULT_TITLE.to_string(),
        }
    }
}
impl From<&DicomLayout> for GridStyle {
    fn from(layout: &DicomLayout) -> Self {
        Self {
            amplitude_mv: layout.amplitude_mv(),
            minor_grid: layout.minor_grid,
            ..GridStyle::default()
        }
    }
}
#[derive(Clone, Debug, PartialEq)]
pub struct CellSpec {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub lead: LeadName,
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,
}
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AxisTicks {
    pub x_major: Vec<f64>,
    pub x_minor: Vec<f64>,
    pub y_major: Vec<f64>,
    pub y_minor: Vec<f64>,
}
/// Pixel sizes derived from point sizes at the render DPI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Strokes {
    pub trace: u32,
    pub major_grid: u32,
    pub minor_grid: u32,
    pub label_font: u32,
    pub label_pad: u32,
    pub title_font: u32,
    pub outer_margin: u32,
    pub cell_margin: u32,
}
#[derive(Clone, Debug)]
pub struct GridLayout {
    canvas: (u32, u32),
    duration: f64,
    cells: Vec<CellSpec>,
    ticks: AxisTicks,
    strokes: Strokes,
    style: GridStyle,
}
impl GridLayout {
    pub fn new(
        sample_count: usize,
        sample_rate_hz: f64,
        settings: &RenderSettings,
        style: &GridStyle,
    ) -> Result<Self, EcgError> {
        if sample_count == 0 {
            return Err(EcgError::EmptyWaveform);
        }
        let duration = duration_seconds(sample_count, sample_rate_hz)?;
        let amplitude = style.amplitude_mv;
        let cells = LeadName::ALL
            .iter()
            .enumerate()
            .map(|(index, &lead)| CellSpec {
                index,
                row: index / GRID_COLS,
                col: index % GRID_COLS,
                lead,
                x_range: 0.0..duration,
                y_range: -amplitude..amplitude,
            })
            .collect();
        let ticks = AxisTicks {
            x_major: arange(0.0, duration, MAJOR_TIME_STEP),
            x_minor: if style.minor_grid {
                arange(0.0, duration, MINOR_TIME_STEP)
            } else {
                Vec::new()
            },
            y_major: arange(-amplitude, amplitude + MAJOR_AMPLITUDE_STEP, MAJOR_AMPLITUDE_STEP),
            y_minor: if style.minor_grid {
                arange(-amplitude, amplitude + MINOR_AMPLITUDE_STEP, MINOR_AMPLITUDE_STEP)
            } else {
                Vec::new()
            },
        };
        let strokes = Strokes {
            trace: settings.pt_to_px(TRACE_WIDTH_PT),
            major_grid: settings.pt_to_px(MAJOR_GRID_WIDTH_PT),
            minor_grid: settings.pt_to_px(MINOR_GRID_WIDTH_PT),
            label_font: settings.pt_to_px(LABEL_FONT_PT),
            label_pad: settings.pt_to_px(LABEL_PAD_PT),
            title_font: settings.pt_to_px(TITLE_FONT_PT),
            outer_margin: settings.pt_to_px(OUTER_MARGIN_PT),
            cell_margin: settings.pt_to_px(CELL_MARGIN_PT),
        };
        Ok(Self {
            canvas: settings.canvas_px(),
            duration,
            cells,
            ticks,
            strokes,
            style: style.clone(),
        })
    }
    pub fn canvas_px(&self) -> (u32, u32) {
        self.canvas
    }
    pub fn duration_seconds(&self) -> f64 {
        self.duration
    }
    pub fn cells(&self) -> &[CellSpec] {
        &self.cells
    }
    pub fn ticks(&self) -> &AxisTicks {
        &self.ticks
    }
    pub fn strokes(&self) -> Strokes {
        self.strokes
    }
    pub fn style(&self) -> &GridStyle {
        &self.style
    }
    /// Height of the band above the grid that holds the title.
    pub fn title_band_px(&self) -> u32 {
        self.strokes.title_font * 2
    }
    /// Width of the column left of each plot: label padding plus room for `aVR`.
    pub fn label_column_px(&self) -> u32 {
        self.strokes.label_pad + self.strokes.label_font * 5 / 2
    }
}
/// Values `start + i * step` for `i` in `0..ceil((stop - start) / step)`.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || !(stop > start) {
        return Vec::new();
    }
    let count = ((stop - start) / step).ceil() as usize;
    (0..count).map(|i| start + i as f64 * step).collect()
}
const _: () = assert!(GRID_ROWS * GRID_COLS == LEAD_COUNT);
