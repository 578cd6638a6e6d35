use std::env;
use std::path::{Path, PathBuf};

use dxfnav_config::AppConfig;
use dxfnav_engine::scene::{DemoSite, NavScene, NavSettings};
use dxfnav_engine::view::Viewport;
use dxfnav_io::{DrawingLoader, DxfFacade};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 图纸来源，便于前端呈现加载信息。
#[derive(Debug, Clone)]
pub enum DrawingSource {
    Dxf(PathBuf),
    Demo,
}

/// 统一封装加载后的场景与元信息。
#[derive(Debug)]
pub struct LoadedScene {
    pub scene: NavScene,
    pub source: DrawingSource,
    pub demo_site: Option<DemoSite>,
}

/// 由配置生成引擎参数。
pub fn settings_from_config(config: &AppConfig) -> NavSettings {
    NavSettings {
        waypoint_layer: config.navigation.waypoint_layer.clone(),
        path_layer: config.navigation.path_layer.clone(),
        snap_threshold: config.navigation.snap_threshold,
        viewport: Viewport::new(config.view.viewport_width, config.view.viewport_height),
        fill_ratio: config.view.fill_ratio,
    }
}

/// 从指定 DXF 文件加载场景，读取失败直接返回错误。
pub fn load_scene_from_path(path: &Path, config: &AppConfig) -> Result<LoadedScene, FrontendError> {
    let drawing = DxfFacade::new().load(path)?;
    info!(
        path = %path.display(),
        layers = drawing.layers().count(),
        primitives = drawing.len(),
        "从 DXF 加载图纸成功"
    );
    Ok(LoadedScene {
        scene: NavScene::with_drawing(drawing, settings_from_config(config)),
        source: DrawingSource::Dxf(path.to_path_buf()),
        demo_site: None,
    })
}

/// 从环境变量 `DXFNAV_SAMPLE_DXF` 指定的路径加载 DXF，
/// 若未设置或加载失败则回退到内置演示场地。
pub fn load_scene_from_env_or_demo(config: &AppConfig) -> LoadedScene {
    if let Some(path) = env::var_os("DXFNAV_SAMPLE_DXF") {
        let path = PathBuf::from(path);
        match load_scene_from_path(&path, config) {
            Ok(loaded) => return loaded,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "加载 DXF 失败，回退到内置示例");
            }
        }
    }
    load_demo_scene(config)
}

pub fn load_demo_scene(config: &AppConfig) -> LoadedScene {
    let mut scene = NavScene::new(settings_from_config(config));
    let demo_site = scene.populate_demo();
    LoadedScene {
        scene,
        source: DrawingSource::Demo,
        demo_site: Some(demo_site),
    }
}
