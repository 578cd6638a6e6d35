use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// 从显式路径加载配置并校验取值范围。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `DXFNAV_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("DXFNAV_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 校验数值配置：阈值与视口尺寸必须为正，填充比例位于 (0, 1]。
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("navigation.snap_threshold", self.navigation.snap_threshold)?;
        positive("view.viewport_width", self.view.viewport_width)?;
        positive("view.viewport_height", self.view.viewport_height)?;
        let fill = self.view.fill_ratio;
        if !(fill.is_finite() && fill > 0.0 && fill <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "view.fill_ratio",
                reason: format!("需位于 (0, 1] 区间，实际为 {fill}"),
            });
        }
        if self.navigation.waypoint_layer.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "navigation.waypoint_layer",
                reason: "图层名不能为空".to_string(),
            });
        }
        if self.navigation.path_layer.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "navigation.path_layer",
                reason: "图层名不能为空".to_string(),
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("需为正数，实际为 {value}"),
        })
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 航点图层、轨迹图层与吸附阈值。
#[derive(Debug, Clone, Deserialize)]
pub struct NavigationConfig {
    #[serde(default = "NavigationConfig::default_waypoint_layer")]
    pub waypoint_layer: String,
    #[serde(default = "NavigationConfig::default_path_layer")]
    pub path_layer: String,
    #[serde(default = "NavigationConfig::default_snap_threshold")]
    pub snap_threshold: f64,
}

impl NavigationConfig {
    fn default_waypoint_layer() -> String {
        "Defpoints".to_string()
    }

    fn default_path_layer() -> String {
        "trackline".to_string()
    }

    fn default_snap_threshold() -> f64 {
        1.0
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            waypoint_layer: Self::default_waypoint_layer(),
            path_layer: Self::default_path_layer(),
            snap_threshold: Self::default_snap_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "ViewConfig::default_width")]
    pub viewport_width: f64,
    #[serde(default = "ViewConfig::default_height")]
    pub viewport_height: f64,
    #[serde(default = "ViewConfig::default_fill_ratio")]
    pub fill_ratio: f64,
}

impl ViewConfig {
    fn default_width() -> f64 {
        1200.0
    }

    fn default_height() -> f64 {
        900.0
    }

    fn default_fill_ratio() -> f64 {
        0.8
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            viewport_width: Self::default_width(),
            viewport_height: Self::default_height(),
            fill_ratio: Self::default_fill_ratio(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("配置项 {field} 无效: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.navigation.waypoint_layer, "Defpoints");
        assert_eq!(cfg.navigation.path_layer, "trackline");
        assert!((cfg.navigation.snap_threshold - 1.0).abs() < f64::EPSILON);
        assert!((cfg.view.fill_ratio - 0.8).abs() < f64::EPSILON);
        assert_eq!(cfg.output.format, OutputFormat::Text);
        cfg.validate().expect("defaults are valid");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [navigation]
            waypoint_layer = "WAYPOINTS"
            path_layer = "PATHS"
            snap_threshold = 0.25

            [view]
            viewport_width = 800.0
            fill_ratio = 0.9

            [output]
            format = "json"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.navigation.waypoint_layer, "WAYPOINTS");
        assert_eq!(cfg.navigation.path_layer, "PATHS");
        assert!((cfg.navigation.snap_threshold - 0.25).abs() < f64::EPSILON);
        assert!((cfg.view.viewport_width - 800.0).abs() < f64::EPSILON);
        assert!((cfg.view.viewport_height - 900.0).abs() < f64::EPSILON);
        assert!((cfg.view.fill_ratio - 0.9).abs() < f64::EPSILON);
        assert_eq!(cfg.output.format, OutputFormat::Json);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [navigation]
            snap_threshold = -1.0
            "#
        )
        .unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "navigation.snap_threshold",
                ..
            }
        ));

        let mut cfg = AppConfig::default();
        cfg.view.fill_ratio = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid {
                field: "view.fill_ratio",
                ..
            })
        ));

        let mut cfg = AppConfig::default();
        cfg.navigation.path_layer = "  ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_errors_carry_the_path() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[view\nfill_ratio = ").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, file.path()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
