//! 命令总线：以名称分发的场景操作。

use std::collections::HashMap;

use dxfnav_core::geometry::Point2;

use crate::scene::NavScene;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(
        name: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub scene: &'a mut NavScene,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(FitViewCommand);
        bus.register(RebuildGraphCommand);
        bus.register(SetSnapCommand);
        bus.register(NeighborsCommand);
        bus.register(ZoomCommand);
        bus.register(PanCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    /// 已注册命令名，按字母序排列。
    pub fn available_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

struct FitViewCommand;

impl CommandHandler for FitViewCommand {
    fn name(&self) -> &'static str {
        "fit_view"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.scene.fit_view() {
            Ok(view) => CommandResponse::ok(format!("视图已适配，缩放={:.3}", view.scale)),
            Err(err) => CommandResponse::err(format!("视图保持不变: {err}")),
        }
    }
}

struct RebuildGraphCommand;

impl CommandHandler for RebuildGraphCommand {
    fn name(&self) -> &'static str {
        "rebuild_graph"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.scene.rebuild_graph();
        let graph = context.scene.graph();
        CommandResponse::ok(format!(
            "导航图已重建：{} 个节点，{} 条边",
            graph.node_count(),
            graph.edge_count()
        ))
    }
}

struct SetSnapCommand;

impl CommandHandler for SetSnapCommand {
    fn name(&self) -> &'static str {
        "set_snap"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(raw) = request.args.first() else {
            return CommandResponse::err("set_snap 需要一个阈值参数");
        };
        let Ok(threshold) = raw.trim().parse::<f64>() else {
            return CommandResponse::err(format!("无法解析阈值: {raw}"));
        };
        match context.scene.set_snap_threshold(threshold) {
            Ok(()) => CommandResponse::ok(format!(
                "吸附阈值已设为 {threshold}，当前 {} 条边",
                context.scene.graph().edge_count()
            )),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct NeighborsCommand;

impl CommandHandler for NeighborsCommand {
    fn name(&self) -> &'static str {
        "neighbors"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(name) = request.args.first() else {
            return CommandResponse::err("neighbors 需要一个节点名称");
        };
        match context.scene.neighbors(name) {
            Ok(neighbors) => {
                let listed: Vec<String> = neighbors
                    .iter()
                    .map(|(neighbor, weight)| format!("{neighbor}({weight:.2})"))
                    .collect();
                CommandResponse::ok(listed.join(", "))
            }
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// 滚轮缩放步长。
const ZOOM_IN_FACTOR: f64 = 1.1;
const ZOOM_OUT_FACTOR: f64 = 0.9;

fn parse_number(raw: &str) -> Result<f64, CommandResponse> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| CommandResponse::err(format!("无法解析数值: {raw}")))
}

/// `zoom <in|out|factor> [x y]`，锚点缺省为视口中心。
struct ZoomCommand;

impl CommandHandler for ZoomCommand {
    fn name(&self) -> &'static str {
        "zoom"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(raw) = request.args.first() else {
            return CommandResponse::err("zoom 需要 in、out 或缩放倍数");
        };
        let factor = match raw.trim() {
            "in" => ZOOM_IN_FACTOR,
            "out" => ZOOM_OUT_FACTOR,
            other => match parse_number(other) {
                Ok(value) => value,
                Err(response) => return response,
            },
        };
        let anchor = match &request.args[1..] {
            [] => context.scene.viewport_center(),
            [x, y] => match (parse_number(x), parse_number(y)) {
                (Ok(x), Ok(y)) => Point2::new(x, y),
                (Err(response), _) | (_, Err(response)) => return response,
            },
            _ => return CommandResponse::err("zoom 的锚点需要同时给出 x 与 y"),
        };
        match context.scene.zoom_at(anchor, factor) {
            Ok(view) => CommandResponse::ok(format!("视图已缩放，缩放={:.3}", view.scale)),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// `pan <dx> <dy>`，增量为设备坐标。
struct PanCommand;

impl CommandHandler for PanCommand {
    fn name(&self) -> &'static str {
        "pan"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let [dx, dy] = request.args.as_slice() else {
            return CommandResponse::err("pan 需要 dx 与 dy 两个参数");
        };
        let (dx, dy) = match (parse_number(dx), parse_number(dy)) {
            (Ok(dx), Ok(dy)) => (dx, dy),
            (Err(response), _) | (_, Err(response)) => return response,
        };
        let view = context.scene.pan(dx, dy);
        CommandResponse::ok(format!(
            "视图已平移，偏移=({:.2}, {:.2})",
            view.offset_x, view.offset_y
        ))
    }
}
