use thiserror::Error;

/// 流水线错误 (Pipeline errors)
///
/// 每个变体对应一种边界处理方式:
/// - `ImageDecode`: 调用方向用户报告 (HTTP 400 / CLI exit 1)
/// - `DetectorUnavailable`: 启动阶段致命错误
/// - `InvalidConfiguration`: 在任何检测工作之前拒绝
#[derive(Debug, Error)]
pub enum HandCountError {
    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    #[error("person detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to encode image: {0}")]
    ImageEncode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HandCountError {
    /// 是否属于调用方输入错误 (而非服务内部错误)
    pub fn is_client_error(&self) -> bool {
        matches!(self, HandCountError::ImageDecode(_))
    }
}

pub type Result<T> = std::result::Result<T, HandCountError>;
