pub mod cli;
pub mod errors;
pub mod loader;

use std::path::Path;

use dxfnav_config::{AppConfig, OutputFormat};
use errors::FrontendError;
use tracing::info;

/// 加载图纸并输出场景概览。
///
/// 显式给出的 DXF 路径读取失败时直接返回错误；未给出路径时依次尝试
/// `DXFNAV_SAMPLE_DXF` 与内置演示场地。
pub fn run_cli(
    config: &AppConfig,
    input: Option<&Path>,
    format: OutputFormat,
) -> Result<(), FrontendError> {
    info!(?format, "启动 CLI 前端");
    let loaded = match input {
        Some(path) => loader::load_scene_from_path(path, config)?,
        None => loader::load_scene_from_env_or_demo(config),
    };
    cli::run(loaded, format)
}
