use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use anyhow::Context;
use serde::{Deserialize, Serialize};
pub const LISTEN_PORT: u16 = 4430;
pub const DEFAULT_SAMPLING_RATE_HZ: f64 = 500.0;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
/// Raster parameters for the clinical grid image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub dpi: f64,
    pub figure_width_in: f64,
    pub figure_height_in: f64,
    /// Applied to raw vector uploads, which carry no rate of their own.
    pub sampling_rate_hz: f64,
}
impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            dpi: 300.0,
            figure_width_in: 12.0,
            figure_height_in: 15.0,
            sampling_rate_hz: DEFAULT_SAMPLING_RATE_HZ,
        }
    }
}
impl RenderSettings {
    pub fn canvas_px(&self) -> (u32, u32) {
        (
            (self.figure_width_in * self.dpi).round().max(1.0) as u32,
            (self.figure_height_in * self.dpi).round().max(1.0) as u32,
        )
    }
    /// Converts a typographic point size to whole pixels at the configured DPI.
    pub fn pt_to_px(&self, points: f64) -> u32 {
        ((points * self.dpi / 72.0).round() as u32).max(1)
    }
}
/// Fixed configuration for DICOM uploads: 6x2 grid, 10 mm/mV, no minor grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DicomLayout {
    pub scale_mm_per_mv: f64,
    pub minor_grid: bool,
}
impl Default for DicomLayout {
    fn default() -> Self {
        Self {
            scale_mm_per_mv: 10.0,
            minor_grid: false,
        }
    }
}
impl DicomLayout {
    /// Half-height of each lead cell on 40 mm paper.
    pub fn amplitude_mv(&self) -> f64 {
        if self.scale_mm_per_mv > 0.0 {
            20.0 / self.scale_mm_per_mv
        } else {
            2.0
        }
    }
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub render: RenderSettings,
    pub dicom: DicomLayout,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: LISTEN_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            render: RenderSettings::default(),
            dicom: DicomLayout::default(),
        }
    }
}
impl ServerConfig {
    /// Compiled-in defaults, optionally overridden by a JSON file.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let config: ServerConfig = serde_json::from_str(raw)?;
        anyhow::ensure!(config.render.dpi > 0.0, "render.dpi must be positive");
        anyhow::ensure!(
            config.render.figure_width_in > 0.0 && config.render.figure_height_in > 0.0,
            "figure size must be positive"
        );
        anyhow::ensure!(
            config.render.sampling_rate_hz > 0.0,
            "render.sampling_rate_hz must be positive"
        );
        Ok(config)
    }
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn defaults_match_clinical_layout() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:4430");
        assert_eq!(config.render.canvas_px(), (3600, 4500));
        assert_eq!(config.render.sampling_rate_hz, 500.0);
        assert_eq!(config.dicom.amplitude_mv(), 2.0);
        assert!(!config.dicom.minor_grid);
    }
    #[test]
    fn points_convert_at_dpi() {
        let settings = RenderSettings::default();
        assert_eq!(settings.pt_to_px(72.0), 300);
        assert_eq!(settings.pt_to_px(12.0), 50);
        assert_eq!(settings.pt_to_px(0.3), 1);
        let tiny = RenderSettings {
            dpi: 10.0,
            ..RenderSettings::default()
        };
        assert_eq!(tiny.pt_to_px(0.3), 1);
    }
    #[test]
    fn json_overrides_only_named_fields() {
        let config =
            ServerConfig::from_json(r#"{"port": 8080, "render": {"dpi": 100}}"#).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.render.dpi, 100.0);
        assert_eq!(config.render.figure_width_in, 12.0);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.render.canvas_px(), (1200, 1500));
    }
    #[test]
    fn json_rejects_non_positive_dpi() {
        assert!(ServerConfig::from_json(r#"{"render": {"dpi": 0}}"#).is_err());
        assert!(ServerConfig::from_json("not json").is_err());
    }
    #[test]
    fn missing_path_means_defaults() {
        assert_eq!(ServerConfig::load(None).unwrap(), ServerConfig::default());
    }
}
