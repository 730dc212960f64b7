use std::fmt;
use ndarray::{Array1, Array2, ArrayView1};
use crate::ecg::EcgError;
pub const LEAD_COUNT: usize = 12;
/// Standard 12-lead ECG channels, in the row order expected by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeadName {
    I,
    II,
    III,
    AVR,
    AVL,
    AVF,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
}
impl LeadName {
    pub const ALL: [LeadName; LEAD_COUNT] = [
        LeadName::I,
        LeadName::II,
        LeadName::III,
        LeadName::AVR,
        LeadName::AVL,
        LeadName::AVF,
        LeadName::V1,
        LeadName::V2,
        LeadName::V3,
        LeadName::V4,
        LeadName::V5,
        LeadName::V6,
    ];
    pub fn label(self) -> &'static str {
        match self {
            LeadName::I => "I",
            LeadName::II => "II",
            LeadName::III => "III",
            LeadName::AVR => "aVR",
            LeadName::AVL => "aVL",
            LeadName::AVF => "aVF",
            LeadName::V1 => "V1",
            LeadName::V2 => "V2",
            LeadName::V3 => "V3",
            LeadName::V4 => "V4",
            LeadName::V5 => "V5",
            LeadName::V6 => "V6",
        }
    }
    pub fn index(self) -> usize {
        self as usize
    }
    /// Parses channel labels such as `"Lead II"`, `"aVR"` or `"Lead I (Einthoven)"`.
    pub fn from_label(label: &str) -> Option<LeadName> {
        let trimmed = label.trim();
        let body = match trimmed.get(..5) {
            Some(prefix) if prefix.eq_ignore_ascii_case("lead ") => &trimmed[5..],
            _ => trimmed,
        };
        let token = body.split_whitespace().next()?;
        LeadName::ALL
            .into_iter()
            .find(|lead| lead.label().eq_ignore_ascii_case(token))
    }
}
impl fmt::Display for LeadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
/// Validated `[12, N]` waveform, one row per lead.
#[derive(Clone, Debug)]
pub struct WaveformMatrix {
    samples: Array2<f64>, // leads x samples
}
impl WaveformMatrix {
    pub fn new(samples: Array2<f64>) -> Result<Self, EcgError> {
        let (leads, count) = samples.dim();
        if leads != LEAD_COUNT {
            return Err(EcgError::LeadCount { actual: leads });
        }
        if count == 0 {
            return Err(EcgError::EmptyWaveform);
        }
        Ok(Self { samples })
    }
    pub fn sample_count(&self) -> usize {
        self.samples.ncols()
    }
    pub fn lead(&self, lead: LeadName) -> ArrayView1<'_, f64> {
        self.samples.row(lead.index())
    }
    pub fn duration_seconds(&self, sample_rate_hz: f64) -> Result<f64, EcgError> {
        duration_seconds(self.sample_count(), sample_rate_hz)
    }
    pub fn into_inner(self) -> Array2<f64> {
        self.samples
    }
}
pub fn duration_seconds(sample_count: usize, sample_rate_hz: f64) -> Result<f64, EcgError> {
    if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
        return Err(EcgError::InvalidSampleRate(sample_rate_hz));
    }
    Ok(sample_count as f64 / sample_rate_hz)
}
/// `count` evenly spaced points over `[0, duration]`, both ends included.
pub fn time_axis(count: usize, duration: f64) -> Array1<f64> {
    if count == 1 {
        return Array1::zeros(1);
    }
    Array1::linspace(0.0, duration, count)
}
