// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 单张图像分析流水线
// 检测 → 过滤(阈值 + NMS) → 逐人举手判定 → 统计 (→ 标注)

use std::sync::Arc;
use std::time::Instant;

use ab_glyph::FontVec;
use image::RgbImage;

use crate::annotate::{AnnotatedImage, Annotator};
use crate::classifier::HandStateClassifier;
use crate::config::AnalyzerConfig;
use crate::detection::{filter, PersonDetector};
use crate::error::{HandCountError, Result};
use crate::stats::aggregate;
use crate::types::{AnalysisResult, PersonDetection};

/// 一次分析的完整输出
#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub detections: Vec<PersonDetection>,
    pub annotated: Option<AnnotatedImage>,
}

/// 分析流水线
///
/// 只持有只读的检测器与字体, 可通过 `Arc` 在线程间共享; 每次调用互不影响
pub struct Pipeline {
    detector: Arc<dyn PersonDetector>,
    font: Option<FontVec>,
}

impl Pipeline {
    pub fn new(detector: Arc<dyn PersonDetector>) -> Self {
        Self {
            detector,
            font: None,
        }
    }

    /// 标签使用 TrueType 字体
    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    /// 分析已解码的图像
    ///
    /// 配置在任何检测工作之前校验; 任一阶段失败则整体失败, 不返回部分结果
    pub fn analyze(
        &self,
        image: &RgbImage,
        config: &AnalyzerConfig,
        want_annotation: bool,
    ) -> Result<Analysis> {
        config.validate()?;

        let t_start = Instant::now();
        let raw = self.detector.detect(image, &config.detector);
        let t_detect = t_start.elapsed();

        let people = filter(&raw, &config.filter);
        log::debug!(
            "[Pipeline] {}: {} 个候选框 → {} 人 (检测 {:?})",
            self.detector.name(),
            raw.len(),
            people.len(),
            t_detect
        );

        let classifier = HandStateClassifier::new(&config.classifier);
        let detections: Vec<PersonDetection> = people
            .into_iter()
            .map(|bbox| PersonDetection::new(bbox, classifier.classify(image, &bbox)))
            .collect();

        let result = aggregate(&detections);

        let annotated = if want_annotation {
            let mut annotator = Annotator::new(&config.annotator).with_font(self.font.as_ref());
            if config.annotator.show_upper_region {
                annotator = annotator.with_upper_region(config.classifier.upper_region_fraction);
            }
            Some(annotator.annotate(image, &detections)?)
        } else {
            None
        };

        log::debug!(
            "[Pipeline] 完成: {} 人, {} 举手, 总耗时 {:?}",
            result.total_people,
            result.hands_raised,
            t_start.elapsed()
        );

        Ok(Analysis {
            result,
            detections,
            annotated,
        })
    }

    /// 解码后分析; 无法解码的输入不会进入检测阶段
    pub fn analyze_bytes(
        &self,
        bytes: &[u8],
        config: &AnalyzerConfig,
        want_annotation: bool,
    ) -> Result<Analysis> {
        let image = decode_image(bytes)?;
        self.analyze(&image, config, want_annotation)
    }
}

/// 解码任意支持格式的图像为 RGB8
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let image =
        image::load_from_memory(bytes).map_err(|e| HandCountError::ImageDecode(e.to_string()))?;
    Ok(image.to_rgb8())
}
