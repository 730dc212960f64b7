use std::fmt;
use crate::config::ServerConfig;
use crate::ecg::dicom::DicomEcgRenderer;
use crate::ecg::plot::ClinicalGridRenderer;
use crate::ecg::vector::decode_hl7vector;
use crate::ecg::EcgError;
/// Upload formats recognised by filename suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadKind {
    /// `*.hl7vector`: a serialized `[12, N]` numeric array.
    RawVector,
    /// `*.dcm`: a DICOM ECG record.
    DicomRecord,
}
impl UploadKind {
    pub fn from_filename(filename: &str) -> Result<Self, EcgError> {
        let suffix = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match suffix.as_deref() {
            Some("hl7vector") => Ok(UploadKind::RawVector),
            Some("dcm") => Ok(UploadKind::DicomRecord),
            _ => Err(EcgError::UnsupportedFileType(filename.to_string())),
        }
    }
}
impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadKind::RawVector => f.write_str("hl7vector"),
            UploadKind::DicomRecord => f.write_str("dicom"),
        }
    }
}
/// Turns uploaded bytes into a PNG according to their kind.
#[derive(Clone, Debug, Default)]
pub struct UploadConverter {
    grid: ClinicalGridRenderer,
    dicom: DicomEcgRenderer,
}
impl UploadConverter {
    pub fn new(config: &ServerConfig) -> Self {
        let grid = ClinicalGridRenderer::new(config.render.clone());
        Self {
            dicom: DicomEcgRenderer::new(grid.clone(), config.dicom),
            grid,
        }
    }
    pub fn convert(&self, kind: UploadKind, bytes: &[u8]) -> Result<Vec<u8>, EcgError> {
        match kind {
            UploadKind::RawVector => {
                let samples = decode_hl7vector(bytes)?;
                self.grid.render(samples)
            }
            UploadKind::DicomRecord => self.dicom.render(bytes),
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderSettings;
    use crate::ecg::vector::encode_npy;
    use ndarray::Array2;
    fn small_converter() -> UploadConverter {
        UploadConverter::new(&ServerConfig {
            render: RenderSettings {
                dpi: 20.0,
                ..RenderSettings::default()
            },
            ..ServerConfig::default()
        })
    }
    #[test]
    fn classifies_by_suffix() {
        assert_eq!(
            UploadKind::from_filename("sample.hl7vector").unwrap(),
            UploadKind::RawVector
        );
        assert_eq!(
            UploadKind::from_filename("ecg.v2.dcm").unwrap(),
            UploadKind::DicomRecord
        );
        assert_eq!(
            UploadKind::from_filename("SCAN.DCM").unwrap(),
            UploadKind::DicomRecord
        );
    }
    #[test]
    fn unknown_suffixes_are_unsupported() {
        for name in ["sample.txt", "dcm", "archive.dcm.zip", ""] {
            let err = UploadKind::from_filename(name).unwrap_err();
            assert!(matches!(err, EcgError::UnsupportedFileType(_)));
            assert!(err.to_string().contains("Unsupported file type"));
        }
    }
    #[test]
    fn converts_raw_vector_uploads() {
        let bytes = encode_npy(&Array2::zeros((12, 500)));
        let png = small_converter()
            .convert(UploadKind::RawVector, &bytes)
            .unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }
    #[test]
    fn raw_vector_lead_count_is_validated() {
        let bytes = encode_npy(&Array2::zeros((10, 500)));
        let err = small_converter()
            .convert(UploadKind::RawVector, &bytes)
            .unwrap_err();
        assert!(err.is_validation());
    }
    #[test]
    fn dicom_failures_surface_as_dicom_errors() {
        let err = small_converter()
            .convert(UploadKind::DicomRecord, b"not a dicom file")
            .unwrap_err();
        assert!(matches!(err, EcgError::Dicom(_)));
    }
}
