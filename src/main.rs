// src/main.rs
use std::path::PathBuf;
use dicom_ecg_converter::{server, ServerConfig};
use log::info;
// 入口函数
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // 可选: 第一个参数为 JSON 配置文件路径
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref())?;
    info!(
        "render settings: {} dpi, {}x{} in, default {} Hz",
        config.render.dpi,
        config.render.figure_width_in,
        config.render.figure_height_in,
        config.render.sampling_rate_hz
    );
    server::serve(config).await
}
