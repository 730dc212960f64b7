use thiserror::Error;
#[derive(Debug, Error)]
pub enum EcgError {
    #[error("Expected ECG data with 12 leads (shape [12, N])")]
    LeadCount { actual: usize },
    #[error("waveform has no samples")]
    EmptyWaveform,
    #[error("sample rate must be a positive number of samples per second, got {0}")]
    InvalidSampleRate(f64),
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("invalid hl7vector payload: {0}")]
    Vector(String),
    #[error("invalid DICOM ECG record: {0}")]
    Dicom(String),
    #[error("invalid upload: {0}")]
    Upload(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl EcgError {
    /// Input that broke the waveform contract, as opposed to a decode or backend failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EcgError::LeadCount { .. } | EcgError::EmptyWaveform | EcgError::InvalidSampleRate(_)
        )
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for EcgError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        EcgError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for EcgError {
    fn from(value: image::ImageError) -> Self {
        EcgError::Plot(value.to_string())
    }
}
impl From<dicom_object::ReadError> for EcgError {
    fn from(value: dicom_object::ReadError) -> Self {
        EcgError::Dicom(value.to_string())
    }
}
impl From<dicom_object::AccessError> for EcgError {
    fn from(value: dicom_object::AccessError) -> Self {
        EcgError::Dicom(value.to_string())
    }
}
impl From<dicom_core::value::ConvertValueError> for EcgError {
    fn from(value: dicom_core::value::ConvertValueError) -> Self {
        EcgError::Dicom(value.to_string())
    }
}
