//! 人体检测器 (Person detector)
//! 职责: 图像金字塔 → HOG 滑动窗口 → 线性SVM打分 → 原图坐标候选框
//!
//! 输出未去重: 同一个人通常对应多个高度重叠的候选框, 交给 `filter` 处理

use std::borrow::Cow;
use std::path::Path;
use std::time::Instant;

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array1;

use super::hog::HogDescriptor;
use super::svm::{score_to_confidence, LinearSvm};
use crate::config::DetectorConfig;
use crate::error::{HandCountError, Result};
use crate::types::BoundingBox;

/// 统一的人体检测接口
///
/// 实现必须是只读的: 模型在构造后不再修改, 因此可以通过 `Arc` 在线程间共享而无需加锁
pub trait PersonDetector: Send + Sync {
    /// 检测器名称
    fn name(&self) -> &'static str;

    /// 检测图像中的人体候选框 (置信度已归一化到 [0, 1], 顺序不保证)
    fn detect(&self, image: &RgbImage, config: &DetectorConfig) -> Vec<BoundingBox>;
}

/// HOG + 线性SVM 多尺度人体检测器
pub struct HogSvmDetector {
    hog: HogDescriptor,
    svm: LinearSvm,
}

impl HogSvmDetector {
    pub fn new(svm: LinearSvm) -> Result<Self> {
        Self::with_descriptor(HogDescriptor::default(), svm)
    }

    pub fn with_descriptor(hog: HogDescriptor, svm: LinearSvm) -> Result<Self> {
        if svm.len() != hog.descriptor_len() {
            return Err(HandCountError::DetectorUnavailable(format!(
                "model has {} weights, descriptor expects {}",
                svm.len(),
                hog.descriptor_len()
            )));
        }
        Ok(Self { hog, svm })
    }

    /// 从模型文件加载 (进程启动时调用一次)
    pub fn from_path(path: &Path) -> Result<Self> {
        let hog = HogDescriptor::default();
        let svm = LinearSvm::load(path, hog.descriptor_len())?;
        log::info!(
            "HOG人体检测模型加载成功: {} ({} 维)",
            path.display(),
            svm.len()
        );
        Ok(Self { hog, svm })
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        Self::from_path(&config.model_path)
    }

    pub fn descriptor(&self) -> &HogDescriptor {
        &self.hog
    }

    /// 金字塔各层的缩放系数 (相对原图的缩小倍数)
    pub fn pyramid_scales(&self, width: u32, height: u32, config: &DetectorConfig) -> Vec<f32> {
        let mut scales = Vec::new();
        let mut scale = config.min_scale;
        while scale <= config.max_scale + 1e-6 {
            let (lw, lh) = level_size(width, height, scale);
            if (lw as usize) < self.hog.window_width || (lh as usize) < self.hog.window_height {
                break;
            }
            scales.push(scale);
            if config.scale_step <= 1.0 {
                break;
            }
            scale *= config.scale_step;
        }
        scales
    }
}

impl PersonDetector for HogSvmDetector {
    fn name(&self) -> &'static str {
        "hog-svm"
    }

    fn detect(&self, image: &RgbImage, config: &DetectorConfig) -> Vec<BoundingBox> {
        let t_start = Instant::now();
        let (width, height) = image.dimensions();
        let (win_w, win_h) = (self.hog.window_width, self.hog.window_height);
        // 窗口必须对齐块网格
        let block_stride = self.hog.block_stride;
        let stride = (config.window_stride as usize / block_stride).max(1) * block_stride;

        let mut boxes = Vec::new();
        let mut descriptor = Array1::<f32>::zeros(self.hog.descriptor_len());
        let scales = self.pyramid_scales(width, height, config);
        for &scale in &scales {
            let (lw, lh) = level_size(width, height, scale);
            let level: Cow<RgbImage> = if (lw, lh) == (width, height) {
                Cow::Borrowed(image)
            } else {
                Cow::Owned(imageops::resize(image, lw, lh, FilterType::Triangle))
            };

            // 实际缩放比 (取整后)
            let sx = width as f32 / lw as f32;
            let sy = height as f32 / lh as f32;

            let grid = self.hog.block_grid(&self.hog.gradients(&level));
            let mut y0 = 0;
            while y0 + win_h <= grid.height() {
                let mut x0 = 0;
                while x0 + win_w <= grid.width() {
                    self.hog.fill_descriptor(&grid, x0, y0, &mut descriptor);
                    let score = self.svm.score(&descriptor);
                    if score > config.hit_threshold {
                        let bbox = BoundingBox::new(
                            x0 as f32 * sx,
                            y0 as f32 * sy,
                            win_w as f32 * sx,
                            win_h as f32 * sy,
                            score_to_confidence(score),
                        );
                        boxes.push(bbox.clamp_to(width, height));
                    }
                    x0 += stride;
                }
                y0 += stride;
            }
        }

        log::debug!(
            "[Detector] {}x{}: {} 层金字塔, {} 个候选框, 耗时 {:?}",
            width,
            height,
            scales.len(),
            boxes.len(),
            t_start.elapsed()
        );
        boxes
    }
}

fn level_size(width: u32, height: u32, scale: f32) -> (u32, u32) {
    (
        (width as f32 / scale).round().max(1.0) as u32,
        (height as f32 / scale).round().max(1.0) as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn constant_detector(bias: f32) -> HogSvmDetector {
        let hog = HogDescriptor::default();
        let svm = LinearSvm::new(vec![0.0; hog.descriptor_len()], bias, hog.descriptor_len())
            .unwrap();
        HogSvmDetector::new(svm).unwrap()
    }

    #[test]
    fn test_single_window_image() {
        let detector = constant_detector(1.0);
        let image = RgbImage::from_pixel(64, 128, Rgb([200, 200, 200]));
        let boxes = detector.detect(&image, &DetectorConfig::default());
        assert_eq!(boxes.len(), 1);
        let b = boxes[0];
        assert_eq!((b.x(), b.y(), b.width(), b.height()), (0.0, 0.0, 64.0, 128.0));
        assert!((b.confidence() - score_to_confidence(1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_image_smaller_than_window() {
        let detector = constant_detector(1.0);
        let image = RgbImage::from_pixel(40, 200, Rgb([0, 0, 0]));
        assert!(detector.detect(&image, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn test_below_hit_threshold() {
        let detector = constant_detector(-5.0);
        let image = RgbImage::from_pixel(128, 256, Rgb([10, 10, 10]));
        assert!(detector.detect(&image, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn test_boxes_inside_image() {
        let detector = constant_detector(0.5);
        let image = RgbImage::from_pixel(150, 230, Rgb([90, 90, 90]));
        let config = DetectorConfig::default();
        let boxes = detector.detect(&image, &config);
        assert!(!boxes.is_empty());
        for b in &boxes {
            assert!(b.x() >= 0.0 && b.y() >= 0.0);
            assert!(b.xmax() <= 150.0 + 1e-3);
            assert!(b.ymax() <= 230.0 + 1e-3);
            assert!((0.0..=1.0).contains(&b.confidence()));
        }
        // 多层金字塔: 应存在大于基础窗口的框
        assert!(boxes.iter().any(|b| b.height() > 128.0));
    }

    #[test]
    fn test_pyramid_scales() {
        let detector = constant_detector(0.0);
        let config = DetectorConfig {
            min_scale: 1.0,
            max_scale: 2.0,
            scale_step: 1.5,
            ..DetectorConfig::default()
        };
        // 1.0 → 1.5 → 2.25 (> max_scale)
        assert_eq!(detector.pyramid_scales(640, 480, &config), vec![1.0, 1.5]);
        // 金字塔在窗口放不下时停止
        assert_eq!(detector.pyramid_scales(64, 128, &config), vec![1.0]);
    }

    #[test]
    fn test_stride_controls_window_count() {
        let detector = constant_detector(1.0);
        let image = RgbImage::from_pixel(80, 128, Rgb([0, 0, 0]));
        let config = DetectorConfig {
            max_scale: 1.0,
            window_stride: 8,
            ..DetectorConfig::default()
        };
        // x ∈ {0, 8, 16}, y ∈ {0}
        assert_eq!(detector.detect(&image, &config).len(), 3);
    }

    #[test]
    fn test_wider_stride_stays_on_block_grid() {
        let detector = constant_detector(1.0);
        let image = RgbImage::from_pixel(80, 128, Rgb([0, 0, 0]));
        let config = DetectorConfig {
            max_scale: 1.0,
            window_stride: 16,
            ..DetectorConfig::default()
        };
        // x ∈ {0, 16}
        let boxes = detector.detect(&image, &config);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[1].x(), 16.0);
    }

    #[test]
    fn test_score_uses_window_descriptor() {
        let hog = HogDescriptor::default();
        let svm = LinearSvm::new(vec![0.001; hog.descriptor_len()], -0.2, hog.descriptor_len())
            .unwrap();
        let detector = HogSvmDetector::new(svm.clone()).unwrap();
        let image = RgbImage::from_fn(64, 128, |x, y| {
            let v = ((x * 13 + y * 7) % 256) as u8;
            Rgb([v, v, v])
        });

        let expected = svm.score(&hog.describe(&image));
        let config = DetectorConfig {
            hit_threshold: f32::MIN,
            ..DetectorConfig::default()
        };
        let boxes = detector.detect(&image, &config);
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].confidence() - score_to_confidence(expected)).abs() < 1e-6);
    }

    #[test]
    fn test_missing_model_path() {
        let config = DetectorConfig {
            model_path: "/nonexistent/model.txt".into(),
            ..DetectorConfig::default()
        };
        assert!(matches!(
            HogSvmDetector::from_config(&config),
            Err(crate::HandCountError::DetectorUnavailable(_))
        ));
    }
}
