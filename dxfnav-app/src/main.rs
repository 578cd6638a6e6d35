use std::path::{Path, PathBuf};

use dxfnav_config::{AppConfig, ConfigError, OutputFormat};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const USAGE: &str = "用法: dxfnav [--config PATH] [--json|--text] [FILE.dxf]";

fn main() {
    let mut args = std::env::args().skip(1);
    let mut override_format: Option<OutputFormat> = None;
    let mut config_override: Option<PathBuf> = None;
    let mut input: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => override_format = Some(OutputFormat::Json),
            "--text" => override_format = Some(OutputFormat::Text),
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                return;
            }
            other if other.starts_with('-') => {
                eprintln!("未知参数：{other}\n{USAGE}");
                std::process::exit(1);
            }
            other => {
                if input.replace(PathBuf::from(other)).is_some() {
                    eprintln!("只能指定一个 DXF 文件\n{USAGE}");
                    std::process::exit(1);
                }
            }
        }
    }

    let (config, fallback_reason) = match load_configuration(config_override.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("加载指定配置失败：{err}");
            std::process::exit(1);
        }
    };
    init_logging(&config);
    if let Some(err) = fallback_reason {
        warn!(error = %err, "加载默认配置失败，使用内建默认值");
    }
    info!("启动 DXF 导航工具");

    let format = override_format.unwrap_or(config.output.format);
    if let Err(err) = dxfnav_frontend::run_cli(&config, input.as_deref(), format) {
        error!(error = %err, "执行 CLI 前端失败");
        std::process::exit(1);
    }
}

/// 显式指定的配置失败时返回错误；自动发现失败时回退到默认配置，并带回失败原因，
/// 以便在日志初始化之后输出。
fn load_configuration(
    override_path: Option<&Path>,
) -> Result<(AppConfig, Option<ConfigError>), ConfigError> {
    match override_path {
        Some(path) => AppConfig::from_file(path).map(|config| (config, None)),
        None => match AppConfig::discover() {
            Ok(config) => Ok((config, None)),
            Err(err) => Ok((AppConfig::default(), Some(err))),
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // 重复初始化时忽略
    let _ = fmt().with_env_filter(filter).try_init();
}
