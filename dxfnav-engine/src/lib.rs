pub mod command;
pub mod extent;
pub mod graph;
pub mod view;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("node {0} not found")]
        NodeNotFound(String),
        #[error("snap threshold must be a positive finite number, got {0}")]
        InvalidSnapThreshold(f64),
        #[error("zoom factor must be a positive finite number, got {0}")]
        InvalidZoomFactor(f64),
    }

    /// 图元字段缺失或形状异常。计算过程中只会被跳过，不会向外传播。
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum MalformedPrimitive {
        #[error("{kind} on layer {layer} has a non-finite coordinate")]
        NonFiniteCoordinate { kind: String, layer: String },
        #[error("{kind} on layer {layer} has invalid radius {radius}")]
        InvalidRadius {
            kind: String,
            layer: String,
            radius: f64,
        },
        #[error("unsupported primitive {kind} on layer {layer}")]
        Unsupported { kind: String, layer: String },
    }

    /// 视图无法自动适配的原因。调用方应保留原有视图。
    #[derive(Debug, Clone, Copy, PartialEq, Error)]
    pub enum FitError {
        #[error("drawing has no primitive contributing to its extent")]
        EmptyExtent,
        #[error("drawing extent is degenerate (width {width}, height {height})")]
        Degenerate { width: f64, height: f64 },
        #[error("invalid viewport {width}x{height} with fill ratio {fill_ratio}")]
        InvalidViewport {
            width: f64,
            height: f64,
            fill_ratio: f64,
        },
    }
}

pub mod scene {
    use dxfnav_core::drawing::{Attribute, Drawing, LayerSummary};
    use dxfnav_core::geometry::{Extent, Point2, Point3};
    use indexmap::IndexMap;
    use tracing::{debug, info};

    use crate::errors::{EngineError, FitError};
    use crate::extent::compute_extent_report;
    use crate::graph::{DEFAULT_SNAP_THRESHOLD, NavGraph, Node, NodeTable, build_graph};
    use crate::view::{DEFAULT_FILL_RATIO, ViewTransform, Viewport};

    pub const DEFAULT_WAYPOINT_LAYER: &str = "Defpoints";
    pub const DEFAULT_PATH_LAYER: &str = "trackline";

    /// 图层选择、吸附阈值与视口参数，均由外部配置提供。
    #[derive(Debug, Clone, PartialEq)]
    pub struct NavSettings {
        pub waypoint_layer: String,
        pub path_layer: String,
        pub snap_threshold: f64,
        pub viewport: Viewport,
        pub fill_ratio: f64,
    }

    impl Default for NavSettings {
        fn default() -> Self {
            Self {
                waypoint_layer: DEFAULT_WAYPOINT_LAYER.to_string(),
                path_layer: DEFAULT_PATH_LAYER.to_string(),
                snap_threshold: DEFAULT_SNAP_THRESHOLD,
                viewport: Viewport::default(),
                fill_ratio: DEFAULT_FILL_RATIO,
            }
        }
    }

    /// 演示图纸中的航点名称与轨迹数量。
    #[derive(Debug, Clone)]
    pub struct DemoSite {
        pub waypoints: Vec<String>,
        pub track_segments: usize,
    }

    /// 引擎层持有当前图纸及其派生数据（范围、视图变换、导航图）。
    #[derive(Debug)]
    pub struct NavScene {
        drawing: Drawing,
        settings: NavSettings,
        view: ViewTransform,
        extent: Extent,
        nodes: NodeTable,
        graph: NavGraph,
    }

    impl NavScene {
        pub fn new(settings: NavSettings) -> Self {
            Self {
                drawing: Drawing::new(),
                settings,
                view: ViewTransform::default(),
                extent: Extent::empty(),
                nodes: NodeTable::new(),
                graph: NavGraph::new(),
            }
        }

        pub fn with_drawing(drawing: Drawing, settings: NavSettings) -> Self {
            let mut scene = Self::new(settings);
            scene.load_drawing(drawing);
            scene
        }

        /// 替换当前图纸，重建导航图并尝试适配视图。
        pub fn load_drawing(&mut self, drawing: Drawing) {
            self.drawing = drawing;
            self.view = ViewTransform::default();
            self.rebuild_graph();
            if let Err(err) = self.fit_view() {
                debug!(error = %err, "图纸范围无法自动适配，保留默认视图");
            }
        }

        /// 重新计算范围并适配视图。失败时保留之前的视图变换。
        pub fn fit_view(&mut self) -> Result<ViewTransform, FitError> {
            let report = compute_extent_report(self.drawing.primitives());
            info!(
                processed = report.processed,
                skipped = report.skipped,
                "已统计参与范围计算的图元"
            );
            self.extent = report.extent;
            self.view.refit(
                &self.extent,
                self.settings.viewport,
                self.settings.fill_ratio,
            )?;
            info!(scale = self.view.scale, "视图已自动适配");
            Ok(self.view)
        }

        /// 以设备坐标为锚点缩放视图，下一次 `fit_view` 会整体覆盖。
        pub fn zoom_at(
            &mut self,
            anchor: Point2,
            factor: f64,
        ) -> Result<ViewTransform, EngineError> {
            self.view.zoom_at(anchor, factor)?;
            debug!(factor, scale = self.view.scale, "视图已缩放");
            Ok(self.view)
        }

        pub fn pan(&mut self, dx: f64, dy: f64) -> ViewTransform {
            self.view.pan(dx, dy);
            debug!(dx, dy, "视图已平移");
            self.view
        }

        /// 视口中心的设备坐标，缩放未指定锚点时使用。
        #[inline]
        pub fn viewport_center(&self) -> Point2 {
            let viewport = self.settings.viewport;
            Point2::new(viewport.width / 2.0, viewport.height / 2.0)
        }

        pub fn rebuild_graph(&mut self) {
            let (nodes, graph) = build_graph(
                &self.drawing,
                &self.settings.waypoint_layer,
                &self.settings.path_layer,
                self.settings.snap_threshold,
            );
            self.nodes = nodes;
            self.graph = graph;
        }

        /// 修改吸附阈值并重建导航图。
        pub fn set_snap_threshold(&mut self, threshold: f64) -> Result<(), EngineError> {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(EngineError::InvalidSnapThreshold(threshold));
            }
            self.settings.snap_threshold = threshold;
            self.rebuild_graph();
            Ok(())
        }

        #[inline]
        pub fn settings(&self) -> &NavSettings {
            &self.settings
        }

        #[inline]
        pub fn drawing(&self) -> &Drawing {
            &self.drawing
        }

        #[inline]
        pub fn layer_summaries(&self) -> Vec<LayerSummary> {
            self.drawing.layer_summaries()
        }

        #[inline]
        pub fn view(&self) -> ViewTransform {
            self.view
        }

        /// 最近一次 `fit_view` 计算得到的范围。
        #[inline]
        pub fn extent(&self) -> Extent {
            self.extent
        }

        #[inline]
        pub fn nodes(&self) -> &NodeTable {
            &self.nodes
        }

        #[inline]
        pub fn graph(&self) -> &NavGraph {
            &self.graph
        }

        #[inline]
        pub fn node(&self, name: &str) -> Option<&Node> {
            self.nodes.get(name)
        }

        pub fn neighbors(&self, name: &str) -> Result<&IndexMap<String, f64>, EngineError> {
            self.graph
                .neighbors(name)
                .ok_or_else(|| EngineError::NodeNotFound(name.to_string()))
        }

        /// 在设备坐标下拾取半径内最近的节点，平局时取先出现者。
        pub fn pick_node(&self, device: Point2, radius_px: f64) -> Option<&Node> {
            let mut best = None;
            let mut min_distance = radius_px;
            for node in self.nodes.values() {
                let projected = self.view.world_to_device(node.position.xy());
                let distance = projected.as_vec2().distance(device.as_vec2());
                if distance < min_distance {
                    min_distance = distance;
                    best = Some(node);
                }
            }
            best
        }

        /// 载入内置演示场地：四个命名航点围成回路，外加一个未命名航点。
        pub fn populate_demo(&mut self) -> DemoSite {
            let waypoint_layer = self.settings.waypoint_layer.clone();
            let path_layer = self.settings.path_layer.clone();
            let mut drawing = Drawing::new();

            let waypoints = [
                ("Gate", 0.0, 0.0),
                ("Lobby", 20.0, 0.0),
                ("Stair", 20.0, 15.0),
                ("Cafe", 0.0, 15.0),
            ];
            for (name, x, y) in waypoints {
                drawing.add_insert(
                    "WAYPOINT",
                    Point3::new(x, y, 0.0),
                    vec![Attribute::new("ID", name)],
                    &waypoint_layer,
                );
            }
            drawing.add_insert(
                "WAYPOINT",
                Point3::new(40.0, 15.0, 0.0),
                Vec::new(),
                &waypoint_layer,
            );

            let tracks = [
                ((0.3, 0.2), (19.6, -0.1)),
                ((20.2, 0.4), (19.9, 14.7)),
                ((19.5, 15.1), (0.4, 15.2)),
                ((0.1, 14.6), (-0.2, 0.5)),
                ((20.5, 15.0), (39.4, 15.3)),
                ((40.0, 0.0), (50.0, 0.0)),
            ];
            for ((x0, y0), (x1, y1)) in tracks {
                drawing.add_line(
                    Point3::new(x0, y0, 0.0),
                    Point3::new(x1, y1, 0.0),
                    &path_layer,
                );
            }

            drawing.add_polyline(
                [
                    Point2::new(-5.0, -5.0),
                    Point2::new(45.0, -5.0),
                    Point2::new(45.0, 20.0),
                    Point2::new(-5.0, 20.0),
                ],
                true,
                "walls",
            );
            drawing.add_circle(Point2::new(10.0, 7.5), 2.0, "fixtures");
            drawing.add_arc(Point2::new(30.0, 7.5), 1.5, 0.0, std::f64::consts::PI, "fixtures");

            self.load_drawing(drawing);

            let site = DemoSite {
                waypoints: self.nodes.keys().cloned().collect(),
                track_segments: tracks.len(),
            };
            debug!(
                waypoints = site.waypoints.len(),
                tracks = site.track_segments,
                "已创建演示场地"
            );
            site
        }
    }

    impl Default for NavScene {
        fn default() -> Self {
            Self::new(NavSettings::default())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn demo_site_builds_loop_and_spur() {
            let mut scene = NavScene::default();
            let site = scene.populate_demo();
            assert_eq!(site.waypoints, vec!["Gate", "Lobby", "Stair", "Cafe", "Node_4"]);
            assert_eq!(site.track_segments, 6);

            let graph = scene.graph();
            assert_eq!(graph.node_count(), 5);
            assert_eq!(graph.edge_count(), 5);
            assert_eq!(graph.weight("Gate", "Lobby"), Some(20.0));
            assert_eq!(graph.weight("Lobby", "Stair"), Some(15.0));
            assert_eq!(graph.weight("Stair", "Node_4"), Some(20.0));
            assert!(graph.weight("Gate", "Stair").is_none());

            let extent = scene.extent();
            assert_eq!(extent, Extent::new(-5.0, -5.0, 50.0, 20.0));
        }

        #[test]
        fn fit_view_centers_extent() {
            let mut scene = NavScene::default();
            scene.populate_demo();
            let view = scene.view();
            // 55 x 25 的范围放入 1200 x 900 视口，X 方向约束更强。
            assert!((view.scale - 0.8 * 1200.0 / 55.0).abs() < 1e-9);
            let center = view.world_to_device(scene.extent().center());
            assert!((center.x() - 600.0).abs() < 1e-9);
            assert!((center.y() - 450.0).abs() < 1e-9);
        }

        #[test]
        fn zoom_and_pan_are_replaced_by_fit_view() {
            let mut scene = NavScene::default();
            scene.populate_demo();
            let fitted = scene.view();

            let center = scene.viewport_center();
            assert_eq!(center, Point2::new(600.0, 450.0));
            let zoomed = scene.zoom_at(center, 1.1).expect("valid factor");
            assert!((zoomed.scale - fitted.scale * 1.1).abs() < 1e-9);
            let stays = zoomed.world_to_device(scene.extent().center());
            assert!((stays.x() - 600.0).abs() < 1e-9);
            assert!((stays.y() - 450.0).abs() < 1e-9);

            let panned = scene.pan(25.0, -10.0);
            assert!((panned.offset_x - zoomed.offset_x - 25.0).abs() < 1e-9);
            assert!(matches!(
                scene.zoom_at(center, 0.0),
                Err(EngineError::InvalidZoomFactor(_))
            ));
            assert_eq!(scene.view(), panned);

            scene.fit_view().expect("demo extent is fittable");
            assert_eq!(scene.view(), fitted);
        }

        #[test]
        fn degenerate_drawing_keeps_previous_view() {
            let mut scene = NavScene::default();
            scene.populate_demo();
            let before = scene.view();

            let mut flat = Drawing::new();
            flat.add_line(
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(10.0, 0.0, 0.0),
                "trackline",
            );
            scene.drawing = flat;
            let err = scene.fit_view().unwrap_err();
            assert!(matches!(err, FitError::Degenerate { .. }));
            assert_eq!(scene.view(), before);
            assert_eq!(scene.extent(), Extent::new(0.0, 0.0, 10.0, 0.0));
        }

        #[test]
        fn loading_empty_drawing_resets_state() {
            let mut scene = NavScene::default();
            scene.populate_demo();
            scene.load_drawing(Drawing::new());
            assert!(scene.nodes().is_empty());
            assert_eq!(scene.graph().edge_count(), 0);
            assert!(scene.extent().is_empty());
            assert_eq!(scene.view(), ViewTransform::default());
        }

        #[test]
        fn snap_threshold_changes_rebuild_graph() {
            let mut scene = NavScene::default();
            scene.populate_demo();
            assert_eq!(scene.graph().edge_count(), 5);

            scene.set_snap_threshold(0.4).expect("valid threshold");
            assert!(scene.graph().edge_count() < 5);

            let err = scene.set_snap_threshold(-1.0).unwrap_err();
            assert!(matches!(err, EngineError::InvalidSnapThreshold(_)));
            let err = scene.set_snap_threshold(f64::NAN).unwrap_err();
            assert!(matches!(err, EngineError::InvalidSnapThreshold(_)));
            assert!((scene.settings().snap_threshold - 0.4).abs() < f64::EPSILON);
        }

        #[test]
        fn neighbor_lookup_reports_missing_nodes() {
            let mut scene = NavScene::default();
            scene.populate_demo();
            let neighbors = scene.neighbors("Stair").expect("stair exists");
            let names: Vec<&str> = neighbors.keys().map(String::as_str).collect();
            assert_eq!(names, vec!["Lobby", "Cafe", "Node_4"]);
            assert!(matches!(
                scene.neighbors("Roof"),
                Err(EngineError::NodeNotFound(name)) if name == "Roof"
            ));
        }

        #[test]
        fn pick_node_uses_device_distance() {
            let mut scene = NavScene::default();
            scene.populate_demo();
            let lobby = scene.node("Lobby").expect("lobby exists").position.xy();
            let device = scene.view().world_to_device(lobby);
            let near = Point2::new(device.x() + 3.0, device.y() - 2.0);
            assert_eq!(scene.pick_node(near, 10.0).map(|n| n.name.as_str()), Some("Lobby"));
            assert!(scene.pick_node(near, 2.0).is_none());
        }
    }
}
