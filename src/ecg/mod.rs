// src/ecg/mod.rs
pub mod dicom;
pub mod error;
pub mod grid;
pub mod plot;
pub mod upload;
pub mod vector;
pub mod waveform;
pub use dicom::{read_dicom_ecg, DicomEcg, DicomEcgRenderer};
pub use error::EcgError;
pub use grid::{GridLayout, GridStyle};
pub use plot::ClinicalGridRenderer;
pub use upload::{UploadConverter, UploadKind};
pub use vector::decode_hl7vector;
pub use waveform::{LeadName, WaveformMatrix};
