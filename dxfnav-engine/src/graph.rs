//! 导航图构建：航点标记生成节点，轨迹线段通过就近吸附连接节点。

use std::collections::{HashMap, HashSet};

use dxfnav_core::drawing::{Attribute, Drawing, Geometry, Primitive};
use dxfnav_core::geometry::Point3;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::extent::validate;

/// 默认吸附阈值（图纸单位）。
pub const DEFAULT_SNAP_THRESHOLD: f64 = 1.0;

/// 标记属性中可作为节点名称的标签，按出现顺序取第一个命中项。
const NAME_TAGS: [&str; 2] = ["ID", "NAME"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub position: Point3,
}

/// 节点表，保持插入顺序；最近节点搜索依赖该顺序决定平局。
pub type NodeTable = IndexMap<String, Node>;

/// 无向带权图：节点名 -> (邻居名 -> 距离)。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavGraph {
    adjacency: IndexMap<String, IndexMap<String, f64>>,
}

impl NavGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 确保节点存在邻接表项。
    pub fn add_node(&mut self, name: &str) {
        if !self.adjacency.contains_key(name) {
            self.adjacency.insert(name.to_string(), IndexMap::new());
        }
    }

    /// 双向写入边，返回是否写入。自环会被拒绝。
    pub fn add_edge(&mut self, u: &str, v: &str, weight: f64) -> bool {
        if u == v {
            return false;
        }
        self.add_node(u);
        self.add_node(v);
        if let Some(neighbors) = self.adjacency.get_mut(u) {
            neighbors.insert(v.to_string(), weight);
        }
        if let Some(neighbors) = self.adjacency.get_mut(v) {
            neighbors.insert(u.to_string(), weight);
        }
        true
    }

    #[inline]
    pub fn neighbors(&self, name: &str) -> Option<&IndexMap<String, f64>> {
        self.adjacency.get(name)
    }

    #[inline]
    pub fn weight(&self, u: &str, v: &str) -> Option<f64> {
        self.adjacency.get(u)?.get(v).copied()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(IndexMap::len).sum::<usize>() / 2
    }

    /// 每条无向边只返回一次，端点按节点插入顺序排列。
    pub fn edges(&self) -> Vec<(&str, &str, f64)> {
        let mut edges = Vec::new();
        for (index, (u, neighbors)) in self.adjacency.iter().enumerate() {
            for (v, weight) in neighbors {
                let Some(other) = self.adjacency.get_index_of(v) else {
                    continue;
                };
                if index < other {
                    edges.push((u.as_str(), v.as_str(), *weight));
                }
            }
        }
        edges
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexMap<String, f64>)> {
        self.adjacency
            .iter()
            .map(|(name, neighbors)| (name.as_str(), neighbors))
    }
}

/// 按图层名提供图元序列的输入源。
pub trait LayerSource {
    fn layer_primitives(&self, name: &str) -> &[Primitive];
}

impl LayerSource for Drawing {
    fn layer_primitives(&self, name: &str) -> &[Primitive] {
        self.layer(name)
    }
}

impl LayerSource for IndexMap<String, Vec<Primitive>> {
    fn layer_primitives(&self, name: &str) -> &[Primitive] {
        self.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl LayerSource for HashMap<String, Vec<Primitive>> {
    fn layer_primitives(&self, name: &str) -> &[Primitive] {
        self.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// 标记的显式名称：第一个 `ID` 或 `NAME` 属性的文本。
pub fn marker_label(attributes: &[Attribute]) -> Option<&str> {
    attributes
        .iter()
        .find(|attr| NAME_TAGS.contains(&attr.tag.as_str()))
        .map(|attr| attr.text.as_str())
}

/// 未命名标记的名称 `Node_{index}`。与任何显式名称或已有节点重名时追加 `_{n}` 后缀，
/// 保证每个未命名标记都生成独立节点。
fn fallback_node_name(index: usize, labels: &HashSet<&str>, nodes: &NodeTable) -> String {
    let base = format!("Node_{index}");
    let mut candidate = base.clone();
    let mut suffix = 1usize;
    while labels.contains(candidate.as_str()) || nodes.contains_key(&candidate) {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    candidate
}

/// 线性扫描最近节点。
///
/// 初始最小距离为 `threshold`，只有严格更小的距离才会替换候选，因此恰好等于阈值的节点被拒绝，
/// 距离相同的节点中先出现者胜出。
pub fn find_nearest<'a>(point: Point3, nodes: &'a NodeTable, threshold: f64) -> Option<&'a str> {
    let mut best = None;
    let mut min_distance = threshold;
    for (name, node) in nodes {
        let distance = point.distance(node.position);
        if distance < min_distance {
            min_distance = distance;
            best = Some(name.as_str());
        }
    }
    best
}

/// 从航点图层与轨迹图层构建导航图。
pub fn build_graph<S: LayerSource + ?Sized>(
    source: &S,
    waypoint_layer: &str,
    path_layer: &str,
    snap_threshold: f64,
) -> (NodeTable, NavGraph) {
    let mut nodes = NodeTable::new();
    let mut graph = NavGraph::new();

    let mut markers = Vec::new();
    for (index, primitive) in source.layer_primitives(waypoint_layer).iter().enumerate() {
        let Geometry::Insert {
            position,
            attributes,
            ..
        } = &primitive.geometry
        else {
            continue;
        };
        if let Err(err) = validate(primitive) {
            trace!(error = %err, "跳过损坏的航点标记");
            continue;
        }
        markers.push((index, *position, marker_label(attributes)));
    }
    let labels: HashSet<&str> = markers.iter().filter_map(|(_, _, label)| *label).collect();

    for (index, position, label) in markers {
        let name = match label {
            Some(label) => {
                if nodes.contains_key(label) {
                    debug!(name = %label, "航点名称重复，后者覆盖前者");
                }
                label.to_string()
            }
            None => fallback_node_name(index, &labels, &nodes),
        };
        graph.add_node(&name);
        nodes.insert(name.clone(), Node { name, position });
    }

    for primitive in source.layer_primitives(path_layer) {
        let Geometry::Line { start, end } = &primitive.geometry else {
            continue;
        };
        if let Err(err) = validate(primitive) {
            trace!(error = %err, "跳过损坏的轨迹线段");
            continue;
        }
        let u = find_nearest(*start, &nodes, snap_threshold);
        let v = find_nearest(*end, &nodes, snap_threshold);
        let (Some(u), Some(v)) = (u, v) else {
            continue;
        };
        if u == v {
            continue;
        }
        let weight = nodes[u].position.distance(nodes[v].position);
        graph.add_edge(u, v, weight);
    }

    info!(
        nodes = nodes.len(),
        edges = graph.edge_count(),
        waypoint_layer,
        path_layer,
        "导航图构建完成"
    );
    for (name, neighbors) in graph.iter() {
        for (neighbor, weight) in neighbors {
            debug!("{name} ---{weight:.2}--- {neighbor}");
        }
    }

    (nodes, graph)
}
