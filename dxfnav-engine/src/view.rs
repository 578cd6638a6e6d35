//! 视图变换：自动适配、缩放与平移。

use dxfnav_core::geometry::{Extent, Point2};
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, FitError};

/// 默认填充比例：范围占视口的 80%。
pub const DEFAULT_FILL_RATIO: f64 = 0.8;

/// 目标视口尺寸（设备像素）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    #[inline]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1200.0, 900.0)
    }
}

/// 世界坐标到设备坐标的均匀缩放与平移。设备坐标 Y 轴向下。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl ViewTransform {
    /// 重新适配范围。失败时保持当前变换不变。
    pub fn refit(
        &mut self,
        extent: &Extent,
        viewport: Viewport,
        fill_ratio: f64,
    ) -> Result<(), FitError> {
        *self = fit(extent, viewport, fill_ratio)?;
        Ok(())
    }

    #[inline]
    pub fn world_to_device(&self, point: Point2) -> Point2 {
        Point2::new(
            point.x() * self.scale + self.offset_x,
            -point.y() * self.scale + self.offset_y,
        )
    }

    #[inline]
    pub fn device_to_world(&self, point: Point2) -> Point2 {
        Point2::new(
            (point.x() - self.offset_x) / self.scale,
            (self.offset_y - point.y()) / self.scale,
        )
    }

    /// 以设备坐标 `anchor` 为中心缩放，锚点下的世界坐标保持不动。
    pub fn zoom_at(&mut self, anchor: Point2, factor: f64) -> Result<(), EngineError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(EngineError::InvalidZoomFactor(factor));
        }
        let world = self.device_to_world(anchor);
        self.scale *= factor;
        self.offset_x = anchor.x() - world.x() * self.scale;
        self.offset_y = anchor.y() + world.y() * self.scale;
        Ok(())
    }

    /// 按设备坐标增量平移。
    #[inline]
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }
}

/// 计算把 `extent` 居中放入视口的变换。
///
/// 缩放取两轴中较小者，保证图形不变形；范围为空或宽高为零时返回 `FitError`。
pub fn fit(extent: &Extent, viewport: Viewport, fill_ratio: f64) -> Result<ViewTransform, FitError> {
    if !viewport.is_valid() || !fill_ratio.is_finite() || fill_ratio <= 0.0 {
        return Err(FitError::InvalidViewport {
            width: viewport.width,
            height: viewport.height,
            fill_ratio,
        });
    }
    if extent.is_empty() {
        return Err(FitError::EmptyExtent);
    }
    let width = extent.width();
    let height = extent.height();
    if !(width > 0.0 && height > 0.0) {
        return Err(FitError::Degenerate { width, height });
    }

    let scale_x = fill_ratio * viewport.width / width;
    let scale_y = fill_ratio * viewport.height / height;
    let scale = scale_x.min(scale_y);
    let center = extent.center();
    Ok(ViewTransform {
        scale,
        offset_x: viewport.width / 2.0 - center.x() * scale,
        offset_y: viewport.height / 2.0 + center.y() * scale,
    })
}
