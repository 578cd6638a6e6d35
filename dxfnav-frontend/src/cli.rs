use std::fmt::Write as _;

use dxfnav_config::OutputFormat;
use dxfnav_core::drawing::LayerSummary;
use dxfnav_core::geometry::Extent;
use dxfnav_engine::command::{CommandBus, CommandContext, CommandRequest};
use dxfnav_engine::scene::NavScene;
use dxfnav_engine::view::ViewTransform;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{DrawingSource, LoadedScene};

/// 场景概览，文本与 JSON 输出共用同一份数据。
#[derive(Debug, Clone, Serialize)]
pub struct SceneReport {
    pub source: String,
    pub commands: Vec<String>,
    pub layers: Vec<LayerSummary>,
    pub extent: Option<Extent>,
    pub view: ViewTransform,
    pub nodes: Vec<NodeReport>,
    pub edges: Vec<EdgeReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub name: String,
    pub world: [f64; 3],
    pub device: [f64; 2],
    pub degree: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeReport {
    pub from: String,
    pub to: String,
    pub weight: f64,
}

/// 通过命令总线适配视图后输出场景报告。
pub fn run(loaded: LoadedScene, format: OutputFormat) -> Result<(), FrontendError> {
    let LoadedScene {
        mut scene, source, ..
    } = loaded;
    let bus = CommandBus::new();
    let mut context = CommandContext { scene: &mut scene };
    let response = bus.dispatch(
        &CommandRequest::new("fit_view", Vec::<String>::new()),
        &mut context,
    );
    if !response.success {
        warn!(message = ?response.message, "fit_view 命令执行失败");
    }

    let report = build_report(&scene, &source, &bus);
    info!(
        nodes = report.nodes.len(),
        edges = report.edges.len(),
        layers = report.layers.len(),
        "CLI 场景统计"
    );
    let rendered = match format {
        OutputFormat::Text => render_text(&report),
        OutputFormat::Json => render_json(&report)?,
    };
    println!("{rendered}");
    Ok(())
}

pub fn build_report(scene: &NavScene, source: &DrawingSource, bus: &CommandBus) -> SceneReport {
    let view = scene.view();
    let extent = scene.extent();
    let graph = scene.graph();

    let nodes = scene
        .nodes()
        .values()
        .map(|node| {
            let device = view.world_to_device(node.position.xy());
            NodeReport {
                name: node.name.clone(),
                world: node.position.as_vec3().to_array(),
                device: [device.x(), device.y()],
                degree: graph.neighbors(&node.name).map_or(0, |n| n.len()),
            }
        })
        .collect();
    let edges = graph
        .edges()
        .into_iter()
        .map(|(from, to, weight)| EdgeReport {
            from: from.to_string(),
            to: to.to_string(),
            weight,
        })
        .collect();

    SceneReport {
        source: describe_source(source),
        commands: bus
            .available_commands()
            .into_iter()
            .map(str::to_string)
            .collect(),
        layers: scene.layer_summaries(),
        extent: (!extent.is_empty()).then_some(extent),
        view,
        nodes,
        edges,
    }
}

fn describe_source(source: &DrawingSource) -> String {
    match source {
        DrawingSource::Dxf(path) => path.display().to_string(),
        DrawingSource::Demo => "demo".to_string(),
    }
}

pub fn render_text(report: &SceneReport) -> String {
    let mut out = String::new();
    // 写入 String 不会失败
    let _ = writeln!(out, "DXF 导航场景概览");
    if report.source == "demo" {
        let _ = writeln!(out, "已构建内置演示场地");
    } else {
        let _ = writeln!(out, "已从 DXF 加载图纸：{}", report.source);
    }
    let _ = writeln!(out, "支持的命令: {}", report.commands.join(", "));

    let _ = writeln!(out, "图层：");
    for layer in &report.layers {
        let _ = writeln!(out, "  - {} ({} 个图元)", layer.name, layer.primitive_count);
    }

    match &report.extent {
        Some(extent) => {
            let _ = writeln!(
                out,
                "图纸范围=({:.2}, {:.2}) - ({:.2}, {:.2})",
                extent.min_x, extent.min_y, extent.max_x, extent.max_y
            );
        }
        None => {
            let _ = writeln!(out, "图纸范围为空");
        }
    }
    let _ = writeln!(
        out,
        "视图缩放={:.3}, 偏移=({:.2}, {:.2})",
        report.view.scale, report.view.offset_x, report.view.offset_y
    );

    let _ = writeln!(out, "导航节点（{} 个）：", report.nodes.len());
    for node in &report.nodes {
        let _ = writeln!(
            out,
            "  - {} 世界=({:.2}, {:.2}, {:.2}) 屏幕=({:.1}, {:.1}) 度={}",
            node.name,
            node.world[0],
            node.world[1],
            node.world[2],
            node.device[0],
            node.device[1],
            node.degree
        );
    }

    let _ = writeln!(out, "导航边（{} 条）：", report.edges.len());
    for edge in &report.edges {
        let _ = writeln!(out, "  {} ---{:.2}--- {}", edge.from, edge.weight, edge.to);
    }
    out.trim_end().to_string()
}

pub fn render_json(report: &SceneReport) -> Result<String, FrontendError> {
    Ok(serde_json::to_string_pretty(report)?)
}
