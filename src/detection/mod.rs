/// 人体检测系统 (Person Detection)
///
/// - hog:      HOG 特征描述子
/// - svm:      线性SVM权重与打分
/// - detector: 多尺度滑窗检测
/// - filter:   置信度过滤 + NMS
pub mod detector;
pub mod filter;
pub mod hog;
pub mod svm;

pub use detector::{HogSvmDetector, PersonDetector};
pub use filter::{filter, non_max_suppression};
pub use hog::HogDescriptor;
pub use svm::LinearSvm;
