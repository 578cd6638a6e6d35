pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    /// 三维点。图纸本身是二维的，但插入点和线段端点保留 Z 值参与距离计算。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        /// 完整的三维欧氏距离。
        #[inline]
        pub fn distance(self, other: Point3) -> f64 {
            self.0.distance(other.0)
        }

        /// 投影到 XY 平面。
        #[inline]
        pub fn xy(self) -> Point2 {
            Point2::new(self.0.x, self.0.y)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    /// 轴对齐范围。空范围以 `+inf/-inf` 哨兵值表示，调用方需通过 `is_empty` 判定。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Extent {
        pub min_x: f64,
        pub min_y: f64,
        pub max_x: f64,
        pub max_y: f64,
    }

    impl Extent {
        #[inline]
        pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
            Self {
                min_x,
                min_y,
                max_x,
                max_y,
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min_x: f64::INFINITY,
                min_y: f64::INFINITY,
                max_x: f64::NEG_INFINITY,
                max_y: f64::NEG_INFINITY,
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min_x > self.max_x || self.min_y > self.max_y
        }

        pub fn include_point(&mut self, point: Point2) {
            self.min_x = self.min_x.min(point.x());
            self.min_y = self.min_y.min(point.y());
            self.max_x = self.max_x.max(point.x());
            self.max_y = self.max_y.max(point.y());
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max_x - self.min_x
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max_y - self.min_y
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            Point2::new(
                (self.min_x + self.max_x) * 0.5,
                (self.min_y + self.max_y) * 0.5,
            )
        }
    }

    impl Default for Extent {
        fn default() -> Self {
            Self::empty()
        }
    }

}

pub mod drawing {
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Point3};

    /// 标记（INSERT）上的属性，按源文件顺序保存。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Attribute {
        pub tag: String,
        pub text: String,
    }

    impl Attribute {
        #[inline]
        pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
            Self {
                tag: tag.into(),
                text: text.into(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum Geometry {
        Line {
            start: Point3,
            end: Point3,
        },
        Circle {
            center: Point2,
            radius: f64,
        },
        /// 角度以弧度储存；范围计算按整圆处理。
        Arc {
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
        },
        Polyline {
            points: Vec<Point2>,
            is_closed: bool,
        },
        /// 块参照，仅记录插入点与属性，不展开块内几何。
        Insert {
            block_name: String,
            position: Point3,
            attributes: Vec<Attribute>,
        },
        /// 解析器识别到但未建模的实体类型。
        Unsupported {
            entity: String,
        },
    }

    impl Geometry {
        /// 与 DXF 实体名称对应的类型标签，便于日志输出。
        pub fn kind(&self) -> &str {
            match self {
                Geometry::Line { .. } => "LINE",
                Geometry::Circle { .. } => "CIRCLE",
                Geometry::Arc { .. } => "ARC",
                Geometry::Polyline { .. } => "POLYLINE",
                Geometry::Insert { .. } => "INSERT",
                Geometry::Unsupported { entity } => entity,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Primitive {
        pub layer: String,
        pub geometry: Geometry,
    }

    impl Primitive {
        #[inline]
        pub fn new(layer: impl Into<String>, geometry: Geometry) -> Self {
            Self {
                layer: layer.into(),
                geometry,
            }
        }
    }

    /// 图层概览：名称与图元数量。
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LayerSummary {
        pub name: String,
        pub primitive_count: usize,
    }

    /// 按图层分组的图元集合。图层顺序即首次出现（或声明）的顺序。
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Drawing {
        layers: IndexMap<String, Vec<Primitive>>,
    }

    impl Drawing {
        pub fn new() -> Self {
            Self::default()
        }

        /// 声明图层。图层表中存在但没有实体的图层也会保留。
        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            if !self.layers.contains_key(key) {
                self.layers.insert(key.to_string(), Vec::new());
            }
        }

        pub fn push(&mut self, primitive: Primitive) {
            self.layers
                .entry(primitive.layer.clone())
                .or_default()
                .push(primitive);
        }

        pub fn add_line(&mut self, start: Point3, end: Point3, layer: impl Into<String>) {
            self.push(Primitive::new(layer, Geometry::Line { start, end }));
        }

        pub fn add_circle(&mut self, center: Point2, radius: f64, layer: impl Into<String>) {
            self.push(Primitive::new(layer, Geometry::Circle { center, radius }));
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) {
            self.push(Primitive::new(
                layer,
                Geometry::Arc {
                    center,
                    radius,
                    start_angle,
                    end_angle,
                },
            ));
        }

        pub fn add_polyline(
            &mut self,
            points: impl IntoIterator<Item = Point2>,
            is_closed: bool,
            layer: impl Into<String>,
        ) {
            self.push(Primitive::new(
                layer,
                Geometry::Polyline {
                    points: points.into_iter().collect(),
                    is_closed,
                },
            ));
        }

        pub fn add_insert(
            &mut self,
            block_name: impl Into<String>,
            position: Point3,
            attributes: Vec<Attribute>,
            layer: impl Into<String>,
        ) {
            self.push(Primitive::new(
                layer,
                Geometry::Insert {
                    block_name: block_name.into(),
                    position,
                    attributes,
                },
            ));
        }

        pub fn add_unsupported(&mut self, kind: impl Into<String>, layer: impl Into<String>) {
            self.push(Primitive::new(
                layer,
                Geometry::Unsupported {
                    entity: kind.into(),
                },
            ));
        }

        /// 返回指定图层的图元；图层不存在时返回空切片。
        #[inline]
        pub fn layer(&self, name: &str) -> &[Primitive] {
            self.layers.get(name).map(Vec::as_slice).unwrap_or(&[])
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = (&str, &[Primitive])> {
            self.layers
                .iter()
                .map(|(name, primitives)| (name.as_str(), primitives.as_slice()))
        }

        pub fn layer_summaries(&self) -> Vec<LayerSummary> {
            self.layers
                .iter()
                .map(|(name, primitives)| LayerSummary {
                    name: name.clone(),
                    primitive_count: primitives.len(),
                })
                .collect()
        }

        #[inline]
        pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
            self.layers.values().flatten()
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.layers.values().map(Vec::len).sum()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl FromIterator<Primitive> for Drawing {
        fn from_iter<T: IntoIterator<Item = Primitive>>(iter: T) -> Self {
            let mut drawing = Drawing::new();
            for primitive in iter {
                drawing.push(primitive);
            }
            drawing
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn drawing_groups_primitives_by_layer_in_first_seen_order() {
            let mut drawing = Drawing::new();
            drawing.ensure_layer("EMPTY");
            drawing.add_line(
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(10.0, 0.0, 0.0),
                "trackline",
            );
            drawing.add_insert(
                "WP",
                Point3::new(0.0, 0.0, 0.0),
                vec![Attribute::new("ID", "A")],
                "Defpoints",
            );
            drawing.add_circle(Point2::new(5.0, 5.0), 1.0, "trackline");
            drawing.add_unsupported("HATCH", "0");

            let names: Vec<&str> = drawing.layers().map(|(name, _)| name).collect();
            assert_eq!(names, vec!["EMPTY", "trackline", "Defpoints", "0"]);
            assert_eq!(drawing.layer("trackline").len(), 2);
            assert!(drawing.layer("EMPTY").is_empty());
            assert!(drawing.layer("missing").is_empty());
            assert_eq!(drawing.len(), 4);
            assert_eq!(drawing.primitives().count(), 4);

            let summaries = drawing.layer_summaries();
            assert_eq!(summaries[1].name, "trackline");
            assert_eq!(summaries[1].primitive_count, 2);
            assert_eq!(summaries[0].primitive_count, 0);
        }

        #[test]
        fn geometry_kind_reports_dxf_names() {
            let drawing: Drawing = [
                Primitive::new(
                    "0",
                    Geometry::Unsupported {
                        entity: "SPLINE".into(),
                    },
                ),
                Primitive::new(
                    "0",
                    Geometry::Polyline {
                        points: vec![],
                        is_closed: false,
                    },
                ),
            ]
            .into_iter()
            .collect();
            let kinds: Vec<&str> = drawing.primitives().map(|p| p.geometry.kind()).collect();
            assert_eq!(kinds, vec!["SPLINE", "POLYLINE"]);
        }

        #[test]
        fn unsupported_geometry_serializes_with_distinct_tag() {
            let geometry = Geometry::Unsupported {
                entity: "HATCH".to_string(),
            };
            let value = serde_json::to_value(&geometry).expect("serialize geometry");
            assert_eq!(
                value,
                serde_json::json!({ "kind": "unsupported", "entity": "HATCH" })
            );
            let parsed: Geometry = serde_json::from_value(value).expect("deserialize geometry");
            assert_eq!(parsed, geometry);
            assert_eq!(parsed.kind(), "HATCH");
        }
    }
}
