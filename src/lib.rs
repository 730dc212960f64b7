//! Renders uploaded 12-lead ECG recordings (raw `.hl7vector` arrays or DICOM
//! waveform records) onto a clinical ECG-paper grid and serves them as PNG.
pub mod config;
pub mod ecg;
pub mod server;
pub use config::{RenderSettings, ServerConfig, LISTEN_PORT};
pub use ecg::{ClinicalGridRenderer, EcgError, UploadKind, WaveformMatrix};
