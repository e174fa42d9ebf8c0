// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 举手判定 (Hand state classifier)
//
// 纯图像启发式, 不做关键点估计:
// - edge_density:    检测框顶部区域的 Canny 边缘密度
// - region_contrast: 顶部区域与头部区域的边缘密度/方差对比

use image::imageops;
use image::{GrayImage, RgbImage};
use imageproc::edges::canny;

use crate::config::{ClassifierConfig, ClassifierMethod, RegionContrastConfig};
use crate::types::{BoundingBox, HandState};

/// Canny 需要 3×3 邻域, 更小的区域直接判为放下
const MIN_REGION_SIDE: u32 = 3;

/// 图像中的整数像素区域 (已裁剪到图像内)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Region {
    /// 检测框在图像内的整数像素部分
    fn from_bbox(bbox: &BoundingBox, image_width: u32, image_height: u32) -> Option<Self> {
        let x0 = bbox.x().max(0.0).min(image_width as f32) as u32;
        let y0 = bbox.y().max(0.0).min(image_height as f32) as u32;
        let x1 = bbox.xmax().max(0.0).min(image_width as f32) as u32;
        let y1 = bbox.ymax().max(0.0).min(image_height as f32) as u32;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    /// 取 [start, end) 行 (相对本区域)
    fn rows(&self, start: u32, end: u32) -> Option<Self> {
        let end = end.min(self.height);
        if end <= start {
            return None;
        }
        Some(Self {
            x: self.x,
            y: self.y + start,
            width: self.width,
            height: end - start,
        })
    }

    fn is_degenerate(&self) -> bool {
        self.width < MIN_REGION_SIDE || self.height < MIN_REGION_SIDE
    }

    fn gray(&self, image: &RgbImage) -> GrayImage {
        let crop = imageops::crop_imm(image, self.x, self.y, self.width, self.height).to_image();
        imageops::grayscale(&crop)
    }
}

/// 灰度区域统计量
struct RegionStats {
    edge_density: f64,
    mean: f64,
    variance: f64,
}

impl RegionStats {
    fn measure(gray: &GrayImage, canny_low: f32, canny_high: f32) -> Self {
        let n = (gray.width() as f64 * gray.height() as f64).max(1.0);
        let edges = canny(gray, canny_low, canny_high);
        let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count();

        let mean = gray.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
        let variance = gray
            .pixels()
            .map(|p| {
                let d = p.0[0] as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        Self {
            edge_density: edge_pixels as f64 / n,
            mean,
            variance,
        }
    }
}

/// 举手判定器
///
/// 无状态, 同一输入总是得到同一结果; 退化区域判为 `Down` 而不报错
pub struct HandStateClassifier<'a> {
    config: &'a ClassifierConfig,
}

impl<'a> HandStateClassifier<'a> {
    pub fn new(config: &'a ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, image: &RgbImage, bbox: &BoundingBox) -> HandState {
        let (width, height) = image.dimensions();
        let Some(region) = Region::from_bbox(bbox, width, height) else {
            return HandState::Down;
        };

        let raised = match self.config.method {
            ClassifierMethod::EdgeDensity => self.edge_density(image, region),
            ClassifierMethod::RegionContrast => {
                region_contrast(image, region, &self.config.region_contrast)
            }
        };
        if raised {
            HandState::Raised
        } else {
            HandState::Down
        }
    }

    /// 上部区域边缘密度
    ///
    /// 举起的手臂在头顶上方形成额外的轮廓, 边缘密度高于阈值即视为举手
    pub fn upper_edge_density(&self, image: &RgbImage, bbox: &BoundingBox) -> Option<f64> {
        let (width, height) = image.dimensions();
        let region = Region::from_bbox(bbox, width, height)?;
        self.upper_region(region).map(|upper| {
            RegionStats::measure(
                &upper.gray(image),
                self.config.canny_low,
                self.config.canny_high,
            )
            .edge_density
        })
    }

    fn upper_region(&self, region: Region) -> Option<Region> {
        let upper_height = (region.height as f32 * self.config.upper_region_fraction) as u32;
        region
            .rows(0, upper_height)
            .filter(|upper| !upper.is_degenerate())
    }

    fn edge_density(&self, image: &RgbImage, region: Region) -> bool {
        let Some(upper) = self.upper_region(region) else {
            return false;
        };
        let stats = RegionStats::measure(
            &upper.gray(image),
            self.config.canny_low,
            self.config.canny_high,
        );
        log::trace!(
            "[Classifier] upper region {}x{} edge density {:.4}",
            upper.width,
            upper.height,
            stats.edge_density
        );
        stats.edge_density > self.config.edge_density_threshold as f64
    }
}

/// 顶部区域 vs 头部区域
///
/// 举手时顶部区域只有细长的手臂, 边缘密度与方差都明显低于头部, 但又不是空白背景
fn region_contrast(image: &RgbImage, region: Region, cfg: &RegionContrastConfig) -> bool {
    let h = region.height as f32;
    let top_height = ((h * cfg.top_region_fraction) as u32).max(1);
    let head_start = (h * cfg.head_region_start) as u32;
    let head_end = (h * cfg.head_region_end) as u32;

    let (Some(top), Some(head)) = (region.rows(0, top_height), region.rows(head_start, head_end))
    else {
        return false;
    };
    if top.is_degenerate() || head.is_degenerate() {
        return false;
    }

    let top = RegionStats::measure(&top.gray(image), cfg.canny_low, cfg.canny_high);
    let head = RegionStats::measure(&head.gray(image), cfg.canny_low, cfg.canny_high);

    if head.edge_density < cfg.min_head_edge_density as f64
        || head.variance < cfg.min_head_variance as f64
    {
        return false;
    }

    let edge_ratio = top.edge_density / head.edge_density;
    let variance_ratio = top.variance / head.variance;
    log::trace!(
        "[Classifier] top density {:.4} mean {:.1}, edge ratio {:.3}, variance ratio {:.3}",
        top.edge_density,
        top.mean,
        edge_ratio,
        variance_ratio
    );

    let has_activity =
        top.edge_density > cfg.min_edge_density as f64 && top.mean < cfg.max_brightness as f64;
    has_activity
        && edge_ratio < cfg.ratio_threshold as f64
        && variance_ratio < cfg.ratio_threshold as f64
}
