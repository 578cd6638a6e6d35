use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("加载图纸失败: {0}")]
    Load(#[from] dxfnav_io::IoError),
    #[error("序列化报告失败: {0}")]
    Json(#[from] serde_json::Error),
}
