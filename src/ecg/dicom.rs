//! DICOM ECG support: pulls the 12 standard leads out of the first waveform
//! multiplex group and renders them with the fixed DICOM grid layout.
use dicom_core::value::PrimitiveValue;
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use log::{debug, warn};
use ndarray::Array2;
use crate::config::DicomLayout;
use crate::ecg::grid::GridStyle;
use crate::ecg::plot::ClinicalGridRenderer;
use crate::ecg::waveform::{LeadName, WaveformMatrix, LEAD_COUNT};
use crate::ecg::EcgError;
const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8] = b"DICM";
/// Leads in millivolts plus the rate they were recorded at.
#[derive(Clone, Debug)]
pub struct DicomEcg {
    pub matrix: WaveformMatrix,
    pub sample_rate_hz: f64,
}
#[derive(Clone, Debug)]
struct ChannelDefinition {
    label: Option<String>,
    /// raw units to millivolts
    scale: f64,
    baseline: f64,
}
#[derive(Clone, Debug, Default)]
pub struct DicomEcgRenderer {
    renderer: ClinicalGridRenderer,
    layout: DicomLayout,
}
impl DicomEcgRenderer {
    pub fn new(renderer: ClinicalGridRenderer, layout: DicomLayout) -> Self {
        Self { renderer, layout }
    }
    pub fn render(&self, bytes: &[u8]) -> Result<Vec<u8>, EcgError> {
        let ecg = read_dicom_ecg(bytes)?;
        self.render_ecg(&ecg)
    }
    pub fn render_ecg(&self, ecg: &DicomEcg) -> Result<Vec<u8>, EcgError> {
        let style = GridStyle::from(&self.layout);
        self.renderer
            .render_styled(&ecg.matrix, ecg.sample_rate_hz, &style)
    }
}
/// Parses a Part 10 file, with or without the 128-byte preamble.
pub fn read_dicom_ecg(bytes: &[u8]) -> Result<DicomEcg, EcgError> {
    let stream = if bytes.get(PREAMBLE_LEN..PREAMBLE_LEN + MAGIC.len()) == Some(MAGIC) {
        &bytes[PREAMBLE_LEN..]
    } else if bytes.starts_with(MAGIC) {
        bytes
    } else {
        return Err(EcgError::Dicom("missing DICM magic code".into()));
    };
    let object = dicom_object::from_reader(stream)?;
    extract_waveform(&object)
}
pub fn extract_waveform(object: &InMemDicomObject) -> Result<DicomEcg, EcgError> {
    let group = object
        .element(tags::WAVEFORM_SEQUENCE)?
        .items()
        .and_then(|items| items.first())
        .ok_or_else(|| EcgError::Dicom("WaveformSequence holds no multiplex group".into()))?;
    let channels = usize::from(group.element(tags::NUMBER_OF_WAVEFORM_CHANNELS)?.to_int::<u16>()?);
    let samples = group.element(tags::NUMBER_OF_WAVEFORM_SAMPLES)?.to_int::<u32>()? as usize;
    let sample_rate_hz = group.element(tags::SAMPLING_FREQUENCY)?.to_float64()?;
    let bits = group.element(tags::WAVEFORM_BITS_ALLOCATED)?.to_int::<u16>()?;
    let interpretation = group
        .element(tags::WAVEFORM_SAMPLE_INTERPRETATION)?
        .to_str()?
        .trim()
        .to_string();
    debug!(
        "DICOM waveform: {channels} channels x {samples} samples @ {sample_rate_hz} Hz, {bits} bit {interpretation}"
    );
    let definitions = group
        .element(tags::CHANNEL_DEFINITION_SEQUENCE)?
        .items()
        .ok_or_else(|| EcgError::Dicom("ChannelDefinitionSequence is not a sequence".into()))?
        .iter()
        .map(channel_definition)
        .collect::<Result<Vec<_>, _>>()?;
    if definitions.len() != channels {
        return Err(EcgError::Dicom(format!(
            "{} channel definitions for {} channels",
            definitions.len(),
            channels
        )));
    }
    let data = group
        .element(tags::WAVEFORM_DATA)?
        .value()
        .primitive()
        .ok_or_else(|| EcgError::Dicom("WaveformData is not a primitive value".into()))?;
    let raw = raw_samples(data, bits, &interpretation)?;
    if raw.len() < channels * samples {
        return Err(EcgError::Dicom(format!(
            "WaveformData holds {} samples, expected {}",
            raw.len(),
            channels * samples
        )));
    }
    let order = lead_order(&definitions)?;
    // samples are interleaved: one value per channel for each time step
    let leads = Array2::from_shape_fn((LEAD_COUNT, samples), |(row, step)| {
        let channel = order[row];
        let def = &definitions[channel];
        (raw[step * channels + channel] + def.baseline) * def.scale
    });
    Ok(DicomEcg {
        matrix: WaveformMatrix::new(leads)?,
        sample_rate_hz,
    })
}
fn channel_definition(item: &InMemDicomObject) -> Result<ChannelDefinition, EcgError> {
    let label = match first_item(item, tags::CHANNEL_SOURCE_SEQUENCE)? {
        Some(source) => optional_str(source, tags::CODE_MEANING)?,
        None => None,
    };
    let label = match label {
        Some(label) => Some(label),
        None => optional_str(item, tags::CHANNEL_LABEL)?,
    };
    let units = match first_item(item, tags::CHANNEL_SENSITIVITY_UNITS_SEQUENCE)? {
        Some(unit) => optional_str(unit, tags::CODE_VALUE)?,
        None => None,
    };
    let sensitivity = optional_f64(item, tags::CHANNEL_SENSITIVITY)?.unwrap_or(1.0);
    let correction = optional_f64(item, tags::CHANNEL_SENSITIVITY_CORRECTION_FACTOR)?.unwrap_or(1.0);
    Ok(ChannelDefinition {
        label,
        scale: sensitivity * correction * millivolts_per_unit(units.as_deref()),
        baseline: optional_f64(item, tags::CHANNEL_BASELINE)?.unwrap_or(0.0),
    })
}
fn first_item(object: &InMemDicomObject, tag: Tag) -> Result<Option<&InMemDicomObject>, EcgError> {
    Ok(object
        .element_opt(tag)?
        .and_then(|element| element.items())
        .and_then(|items| items.first()))
}
fn optional_str(object: &InMemDicomObject, tag: Tag) -> Result<Option<String>, EcgError> {
    match object.element_opt(tag)? {
        Some(element) => Ok(Some(element.to_str()?.trim().to_string())),
        None => Ok(None),
    }
}
fn optional_f64(object: &InMemDicomObject, tag: Tag) -> Result<Option<f64>, EcgError> {
    match object.element_opt(tag)? {
        Some(element) => Ok(Some(element.to_float64()?)),
        None => Ok(None),
    }
}
fn millivolts_per_unit(code: Option<&str>) -> f64 {
    match code {
        Some("mV") => 1.0,
        Some("V") => 1000.0,
        Some("uV") | Some("µV") | None => 0.001,
        Some(other) => {
            warn!("unknown channel sensitivity unit {other:?}, assuming microvolts");
            0.001
        }
    }
}
/// Channel index for each standard lead. Falls back to stored order when the
/// labels do not name all twelve leads.
fn lead_order(definitions: &[ChannelDefinition]) -> Result<Vec<usize>, EcgError> {
    let by_label: Vec<Option<usize>> = LeadName::ALL
        .iter()
        .map(|lead| {
            definitions.iter().position(|def| {
                def.label.as_deref().and_then(LeadName::from_label) == Some(*lead)
            })
        })
        .collect();
    if let Some(order) = by_label.into_iter().collect::<Option<Vec<usize>>>() {
        return Ok(order);
    }
    if definitions.len() == LEAD_COUNT {
        warn!("channel labels do not name the 12 standard leads; using stored channel order");
        return Ok((0..LEAD_COUNT).collect());
    }
    Err(EcgError::LeadCount {
        actual: definitions.len(),
    })
}
fn raw_samples(value: &PrimitiveValue, bits: u16, interpretation: &str) -> Result<Vec<f64>, EcgError> {
    let signed = match interpretation {
        "SS" | "SB" => true,
        "US" | "UB" => false,
        other => {
            return Err(EcgError::Dicom(format!(
                "unsupported waveform sample interpretation {other}"
            )))
        }
    };
    let word = |v: u16| if signed { f64::from(v as i16) } else { f64::from(v) };
    let byte = |v: u8| if signed { f64::from(v as i8) } else { f64::from(v) };
    let samples: Vec<f64> = match (value, bits) {
        (PrimitiveValue::I16(values), 16) => values.iter().map(|&v| word(v as u16)).collect(),
        (PrimitiveValue::U16(values), 16) => values.iter().map(|&v| word(v)).collect(),
        (PrimitiveValue::U8(bytes), 16) => bytes
            .chunks_exact(2)
            .map(|pair| word(u16::from_le_bytes([pair[0], pair[1]])))
            .collect(),
        (PrimitiveValue::U8(bytes), 8) => bytes.iter().map(|&v| byte(v)).collect(),
        _ => {
            return Err(EcgError::Dicom(format!(
                "unsupported WaveformData encoding for {bits} bits allocated"
            )))
        }
    };
    Ok(samples)
}
