// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod annotate; // 结果可视化
pub mod classifier; // 举手判定
pub mod config; // 分析参数配置
pub mod detection; // 人体检测 (HOG + 线性SVM)
pub mod error; // 错误类型
pub mod pipeline; // 单张图像分析流水线
pub mod server; // HTTP 服务
pub mod stats; // 统计汇总
pub mod types; // 检测框 / 手势 / 统计结果

pub use crate::annotate::{AnnotatedImage, Annotator};
pub use crate::classifier::HandStateClassifier;
pub use crate::config::{
    AnalyzerConfig, AnnotationFormat, AnnotatorConfig, ClassifierConfig, ClassifierMethod,
    DetectorConfig, FilterConfig, RegionContrastConfig, ServerConfig, Settings,
};
pub use crate::detection::{HogSvmDetector, PersonDetector};
pub use crate::error::{HandCountError, Result};
pub use crate::pipeline::{decode_image, Analysis, Pipeline};
pub use crate::server::{HttpServer, ServerHandle};
pub use crate::stats::aggregate;
pub use crate::types::{AnalysisResult, BoundingBox, HandState, PersonDetection};
