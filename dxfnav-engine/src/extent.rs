//! 图纸范围计算。逐个图元累积 min/max，损坏的图元直接跳过。

use dxfnav_core::drawing::{Geometry, Primitive};
use dxfnav_core::geometry::{Extent, Point2};
use tracing::trace;

use crate::errors::MalformedPrimitive;

/// 范围计算结果，附带处理与跳过的图元数量。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtentReport {
    pub extent: Extent,
    pub processed: usize,
    pub skipped: usize,
}

/// 检查图元字段是否可用于几何计算。
pub fn validate(primitive: &Primitive) -> Result<(), MalformedPrimitive> {
    let non_finite = || MalformedPrimitive::NonFiniteCoordinate {
        kind: primitive.geometry.kind().to_string(),
        layer: primitive.layer.clone(),
    };
    match &primitive.geometry {
        Geometry::Line { start, end } => {
            if !start.is_finite() || !end.is_finite() {
                return Err(non_finite());
            }
        }
        Geometry::Circle { center, radius } | Geometry::Arc { center, radius, .. } => {
            if !center.is_finite() {
                return Err(non_finite());
            }
            if !radius.is_finite() || *radius < 0.0 {
                return Err(MalformedPrimitive::InvalidRadius {
                    kind: primitive.geometry.kind().to_string(),
                    layer: primitive.layer.clone(),
                    radius: *radius,
                });
            }
        }
        Geometry::Polyline { points, .. } => {
            if points.iter().any(|point| !point.is_finite()) {
                return Err(non_finite());
            }
        }
        Geometry::Insert { position, .. } => {
            if !position.is_finite() {
                return Err(non_finite());
            }
        }
        Geometry::Unsupported { entity } => {
            return Err(MalformedPrimitive::Unsupported {
                kind: entity.clone(),
                layer: primitive.layer.clone(),
            });
        }
    }
    Ok(())
}

fn include_geometry(geometry: &Geometry, extent: &mut Extent) {
    match geometry {
        Geometry::Line { start, end } => {
            extent.include_point(start.xy());
            extent.include_point(end.xy());
        }
        Geometry::Circle { center, radius } | Geometry::Arc { center, radius, .. } => {
            extent.include_point(Point2::new(center.x() - radius, center.y() - radius));
            extent.include_point(Point2::new(center.x() + radius, center.y() + radius));
        }
        Geometry::Polyline { points, .. } => {
            for point in points {
                extent.include_point(*point);
            }
        }
        Geometry::Insert { position, .. } => {
            extent.include_point(position.xy());
        }
        Geometry::Unsupported { .. } => {}
    }
}

pub fn compute_extent_report<'a>(
    primitives: impl IntoIterator<Item = &'a Primitive>,
) -> ExtentReport {
    let mut extent = Extent::empty();
    let mut processed = 0;
    let mut skipped = 0;
    for primitive in primitives {
        match validate(primitive) {
            Ok(()) => {
                include_geometry(&primitive.geometry, &mut extent);
                processed += 1;
            }
            Err(err) => {
                trace!(error = %err, "跳过无法参与范围计算的图元");
                skipped += 1;
            }
        }
    }
    ExtentReport {
        extent,
        processed,
        skipped,
    }
}

/// 计算所有图元的二维范围。没有可用图元时返回哨兵状态的空范围。
pub fn compute_extent<'a>(primitives: impl IntoIterator<Item = &'a Primitive>) -> Extent {
    compute_extent_report(primitives).extent
}
