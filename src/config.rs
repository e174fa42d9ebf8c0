//! 分析参数配置 - 通过JSON文件 / 环境变量 / 命令行调整
//!
//! 优先级 (低 → 高): 内置默认值 → JSON 文件 → 环境变量 → 命令行参数

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HandCountError, Result};

pub const ENV_MODEL: &str = "HANDCOUNT_MODEL";
pub const ENV_FONT: &str = "HANDCOUNT_FONT";
pub const ENV_ADDR: &str = "HANDCOUNT_ADDR";
pub const ENV_WORKERS: &str = "HANDCOUNT_WORKERS";

/// 流水线参数 (检测 / 过滤 / 分类 / 标注)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub detector: DetectorConfig,
    pub filter: FilterConfig,
    pub classifier: ClassifierConfig,
    pub annotator: AnnotatorConfig,
}

/// 人体检测参数 (HOG 滑动窗口 + 图像金字塔)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: PathBuf, // 线性SVM权重文件
    pub min_scale: f32,      // 金字塔最小缩放
    pub max_scale: f32,      // 金字塔最大缩放
    pub scale_step: f32,     // 相邻层缩放比
    pub window_stride: u32,  // 滑窗步长(像素)
    pub hit_threshold: f32,  // SVM原始分数阈值
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/hog_people_svm.txt"),
            min_scale: 1.0,
            max_scale: 8.0,
            scale_step: 1.05,
            window_stride: 8,
            hit_threshold: -0.3,
        }
    }
}

/// 置信度过滤 + NMS 参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_confidence: f32,
    pub iou_threshold: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5744, // sigmoid(0.3): SVM 分数 > 0.3
            iou_threshold: 0.35,
        }
    }
}

/// 举手判定方法
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMethod {
    /// 上部区域边缘密度
    EdgeDensity,
    /// 顶部区域与头部区域对比
    RegionContrast,
}

impl std::str::FromStr for ClassifierMethod {
    type Err = HandCountError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "edge_density" => Ok(ClassifierMethod::EdgeDensity),
            "region_contrast" => Ok(ClassifierMethod::RegionContrast),
            other => Err(HandCountError::InvalidConfiguration(format!(
                "unknown classifier method '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub method: ClassifierMethod,

    // === 边缘密度法 ===
    pub upper_region_fraction: f32,  // 分析检测框顶部的比例
    pub edge_density_threshold: f32, // 边缘密度阈值
    pub canny_low: f32,
    pub canny_high: f32,

    // === 区域对比法 ===
    pub region_contrast: RegionContrastConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            method: ClassifierMethod::EdgeDensity,
            upper_region_fraction: 0.4,
            edge_density_threshold: 0.05,
            canny_low: 50.0,
            canny_high: 150.0,
            region_contrast: RegionContrastConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionContrastConfig {
    pub top_region_fraction: f32, // 举起的手/手臂所在区域
    pub head_region_start: f32,   // 头部区域起点
    pub head_region_end: f32,     // 头部区域终点
    pub canny_low: f32,
    pub canny_high: f32,
    pub min_edge_density: f32, // 顶部区域最低边缘密度
    pub max_brightness: f32,   // 顶部区域平均亮度上限 (高于此视为背景)
    pub ratio_threshold: f32,  // 边缘/方差比值阈值
    pub min_head_edge_density: f32,
    pub min_head_variance: f32,
}

impl Default for RegionContrastConfig {
    fn default() -> Self {
        Self {
            top_region_fraction: 0.15,
            head_region_start: 0.15,
            head_region_end: 0.35,
            canny_low: 30.0,
            canny_high: 100.0,
            min_edge_density: 0.008,
            max_brightness: 220.0,
            ratio_threshold: 0.75,
            min_head_edge_density: 0.001,
            min_head_variance: 1.0,
        }
    }
}

/// 标注图输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationFormat {
    Png,
    Jpeg,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    pub format: AnnotationFormat,
    pub jpeg_quality: u8,
    pub line_thickness: u32,
    pub show_upper_region: bool, // 绘制上部分析区域分界线
    pub font_path: Option<PathBuf>,
    pub font_scale: f32,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            format: AnnotationFormat::Png,
            jpeg_quality: 90,
            line_thickness: 2,
            show_upper_region: false,
            font_path: None,
            font_scale: 16.0,
        }
    }
}

/// HTTP 服务参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub workers: usize,
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64, // 单个请求总超时 (408)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:5000".to_string(),
            workers: 4,
            max_body_bytes: 16 * 1024 * 1024, // 16MB
            request_timeout_secs: 30,
        }
    }
}

/// 配置文件整体结构 (流水线参数 + 可选的 `server` 段)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(flatten)]
    pub analyzer: AnalyzerConfig,
    pub server: ServerConfig,
}

impl Settings {
    /// 默认值 → JSON 文件 (若提供) → 环境变量, 最后校验
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 从JSON文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            HandCountError::InvalidConfiguration(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let settings = serde_json::from_str(&json).map_err(|e| {
            HandCountError::InvalidConfiguration(format!(
                "invalid config file {}: {}",
                path.display(),
                e
            ))
        })?;
        log::info!("配置已从 {} 加载", path.display());
        Ok(settings)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json)?;
        log::info!("配置已保存到 {}", path.display());
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| HandCountError::InvalidConfiguration(e.to_string()))
    }

    fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// 按变量名查询覆盖值 (空值忽略)
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(model) = get(ENV_MODEL) {
            self.analyzer.detector.model_path = PathBuf::from(model);
        }
        if let Some(font) = get(ENV_FONT) {
            self.analyzer.annotator.font_path = Some(PathBuf::from(font));
        }
        if let Some(addr) = get(ENV_ADDR) {
            self.server.addr = addr;
        }
        if let Some(workers) = get(ENV_WORKERS) {
            self.server.workers = workers.parse().map_err(|_| {
                HandCountError::InvalidConfiguration(format!(
                    "{} must be a positive integer",
                    ENV_WORKERS
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.analyzer.validate()?;
        self.server.validate()
    }
}

impl AnalyzerConfig {
    /// 参数范围校验, 在任何检测工作之前调用
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        ensure(
            d.min_scale.is_finite() && d.min_scale > 0.0,
            "detector.min_scale must be > 0",
        )?;
        ensure(
            d.max_scale.is_finite() && d.max_scale >= d.min_scale,
            "detector.max_scale must be >= detector.min_scale",
        )?;
        ensure(
            d.scale_step.is_finite() && d.scale_step > 1.0,
            "detector.scale_step must be > 1.0",
        )?;
        ensure(
            d.window_stride >= 8 && d.window_stride % 8 == 0,
            "detector.window_stride must be a positive multiple of 8 (HOG block stride)",
        )?;
        ensure(
            d.hit_threshold.is_finite(),
            "detector.hit_threshold must be finite",
        )?;

        let f = &self.filter;
        ensure(
            unit_interval(f.min_confidence),
            "filter.min_confidence must be within [0, 1]",
        )?;
        ensure(
            unit_interval(f.iou_threshold),
            "filter.iou_threshold must be within [0, 1]",
        )?;

        let c = &self.classifier;
        ensure(
            c.upper_region_fraction > 0.0 && c.upper_region_fraction <= 1.0,
            "classifier.upper_region_fraction must be within (0, 1]",
        )?;
        ensure(
            unit_interval(c.edge_density_threshold),
            "classifier.edge_density_threshold must be within [0, 1]",
        )?;
        ensure(
            c.canny_low >= 0.0 && c.canny_high >= c.canny_low,
            "classifier.canny_high must be >= classifier.canny_low >= 0",
        )?;

        let r = &c.region_contrast;
        ensure(
            r.top_region_fraction > 0.0 && r.top_region_fraction <= 1.0,
            "classifier.region_contrast.top_region_fraction must be within (0, 1]",
        )?;
        ensure(
            unit_interval(r.head_region_start)
                && unit_interval(r.head_region_end)
                && r.head_region_start < r.head_region_end,
            "classifier.region_contrast head region must satisfy 0 <= start < end <= 1",
        )?;
        ensure(
            r.canny_low >= 0.0 && r.canny_high >= r.canny_low,
            "classifier.region_contrast.canny_high must be >= canny_low >= 0",
        )?;
        ensure(
            unit_interval(r.min_edge_density) && unit_interval(r.min_head_edge_density),
            "classifier.region_contrast edge densities must be within [0, 1]",
        )?;
        ensure(
            (0.0..=255.0).contains(&r.max_brightness),
            "classifier.region_contrast.max_brightness must be within [0, 255]",
        )?;
        ensure(
            r.ratio_threshold.is_finite() && r.ratio_threshold > 0.0,
            "classifier.region_contrast.ratio_threshold must be > 0",
        )?;
        ensure(
            r.min_head_variance.is_finite() && r.min_head_variance >= 0.0,
            "classifier.region_contrast.min_head_variance must be >= 0",
        )?;

        let a = &self.annotator;
        ensure(
            (1..=100).contains(&a.jpeg_quality),
            "annotator.jpeg_quality must be within [1, 100]",
        )?;
        ensure(
            (1..=32).contains(&a.line_thickness),
            "annotator.line_thickness must be within [1, 32]",
        )?;
        ensure(
            a.font_scale.is_finite() && a.font_scale > 0.0,
            "annotator.font_scale must be > 0",
        )?;
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        log::info!("当前分析配置:");
        log::info!("  SVM模型: {}", self.detector.model_path.display());
        log::info!(
            "  金字塔: {:.2}..{:.2} 步长 {:.3}, 滑窗步长 {}px, 命中阈值 {:.2}",
            self.detector.min_scale,
            self.detector.max_scale,
            self.detector.scale_step,
            self.detector.window_stride,
            self.detector.hit_threshold
        );
        log::info!(
            "  置信度阈值: {:.2}, NMS IOU阈值: {:.2}",
            self.filter.min_confidence,
            self.filter.iou_threshold
        );
        log::info!(
            "  举手判定: {:?} (上部比例 {:.2}, 边缘密度阈值 {:.3})",
            self.classifier.method,
            self.classifier.upper_region_fraction,
            self.classifier.edge_density_threshold
        );
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        ensure(!self.addr.trim().is_empty(), "server.addr must not be empty")?;
        ensure(self.workers >= 1, "server.workers must be >= 1")?;
        ensure(self.max_body_bytes > 0, "server.max_body_bytes must be > 0")?;
        ensure(
            self.request_timeout_secs > 0,
            "server.request_timeout_secs must be > 0",
        )?;
        Ok(())
    }
}

fn ensure(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(HandCountError::InvalidConfiguration(message.to_string()))
    }
}

fn unit_interval(value: f32) -> bool {
    (0.0..=1.0).contains(&value)
}
