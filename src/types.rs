// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use serde::Serialize;

/// 检测框 (Person bounding box)
///
/// 原图像素坐标, 左上角 + 宽高; `confidence ∈ [0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BoundingBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    confidence: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn new_from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, width, height, 0.0)
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmax(&self) -> f32 {
        self.x + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.y + self.height
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn intersection_area(&self, another: &BoundingBox) -> f32 {
        let l = self.x.max(another.x);
        let r = self.xmax().min(another.xmax());
        let t = self.y.max(another.y);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &BoundingBox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    /// 交并比 (Intersection over Union)
    ///
    /// 并集为0时两个框视为重合 (IoU = 1.0)
    pub fn iou(&self, another: &BoundingBox) -> f32 {
        let union = self.union(another);
        if union <= 0.0 {
            return 1.0;
        }
        self.intersection_area(another) / union
    }

    /// 裁剪到图像范围内, 保证 `x + width <= image_width`
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Self {
        let (w, h) = (image_width as f32, image_height as f32);
        let x = self.x.clamp(0.0, w);
        let y = self.y.clamp(0.0, h);
        Self {
            x,
            y,
            width: (self.xmax().min(w) - x).max(0.0),
            height: (self.ymax().min(h) - y).max(0.0),
            confidence: self.confidence,
        }
    }
}

/// 手势状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandState {
    Raised,
    Down,
}

impl HandState {
    pub fn is_raised(&self) -> bool {
        matches!(self, HandState::Raised)
    }

    pub fn label(&self) -> &'static str {
        match self {
            HandState::Raised => "RAISED",
            HandState::Down => "DOWN",
        }
    }
}

/// 单人检测结果 (检测框 + 手势)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PersonDetection {
    pub bbox: BoundingBox,
    pub hand_state: HandState,
}

impl PersonDetection {
    pub fn new(bbox: BoundingBox, hand_state: HandState) -> Self {
        Self { bbox, hand_state }
    }
}

/// 统计结果, 字段名即 HTTP 接口的 JSON 字段名
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AnalysisResult {
    pub total_people: usize,
    pub hands_raised: usize,
    pub hands_down: usize,
    #[serde(rename = "hands_raised_proportion")]
    pub raised_proportion: f64,
    #[serde(rename = "hands_down_proportion")]
    pub down_proportion: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical() {
        let a = BoundingBox::new(10.0, 10.0, 100.0, 200.0, 0.9);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0, 0.9);
        let b = BoundingBox::new(20.0, 20.0, 10.0, 10.0, 0.9);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = BoundingBox::new_from_xywh(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new_from_xywh(5.0, 0.0, 10.0, 10.0);
        // 交集50, 并集150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_zero_area_boxes() {
        let a = BoundingBox::new_from_xywh(5.0, 5.0, 0.0, 0.0);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_clamp_to_image() {
        let b = BoundingBox::new(-10.0, 20.0, 100.0, 200.0, 0.5).clamp_to(64, 128);
        assert_eq!(b.x(), 0.0);
        assert_eq!(b.width(), 64.0);
        assert_eq!(b.y(), 20.0);
        assert_eq!(b.height(), 108.0);
        assert!(b.xmax() <= 64.0 && b.ymax() <= 128.0);
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(BoundingBox::new(0.0, 0.0, 1.0, 1.0, 1.7).confidence(), 1.0);
        assert_eq!(BoundingBox::new(0.0, 0.0, 1.0, 1.0, -0.2).confidence(), 0.0);
    }

    #[test]
    fn test_result_json_field_names() {
        let r = AnalysisResult {
            total_people: 2,
            hands_raised: 1,
            hands_down: 1,
            raised_proportion: 50.0,
            down_proportion: 50.0,
        };
        let v = serde_json::to_value(r).unwrap();
        assert_eq!(v["total_people"], 2);
        assert_eq!(v["hands_raised_proportion"], 50.0);
        assert_eq!(v["hands_down_proportion"], 50.0);
        assert_eq!(v.as_object().unwrap().len(), 5);
    }
}
