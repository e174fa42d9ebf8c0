// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 结果可视化: 在原图副本上绘制检测框与手势标签, 编码为 PNG / JPEG

pub mod glyphs;

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;

use crate::config::{AnnotationFormat, AnnotatorConfig};
use crate::error::{HandCountError, Result};
use crate::types::{HandState, PersonDetection};

const RAISED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const DOWN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const REGION_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const LABEL_PADDING: u32 = 3;

fn state_color(state: HandState) -> Rgb<u8> {
    match state {
        HandState::Raised => RAISED_COLOR,
        HandState::Down => DOWN_COLOR,
    }
}

/// 加载标签用的 TrueType 字体 (启动时调用一次)
pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path).map_err(|e| {
        HandCountError::InvalidConfiguration(format!(
            "failed to read font {}: {}",
            path.display(),
            e
        ))
    })?;
    FontVec::try_from_vec(bytes).map_err(|e| {
        HandCountError::InvalidConfiguration(format!("invalid font {}: {}", path.display(), e))
    })
}

/// 编码后的标注图
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedImage {
    pub bytes: Vec<u8>,
    pub format: AnnotationFormat,
    pub width: u32,
    pub height: u32,
}

impl AnnotatedImage {
    pub fn mime_type(&self) -> &'static str {
        match self.format {
            AnnotationFormat::Png => "image/png",
            AnnotationFormat::Jpeg => "image/jpeg",
        }
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type(),
            STANDARD.encode(&self.bytes)
        )
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// 标注器
pub struct Annotator<'a> {
    config: &'a AnnotatorConfig,
    font: Option<&'a FontVec>,
    upper_region_fraction: Option<f32>,
}

impl<'a> Annotator<'a> {
    pub fn new(config: &'a AnnotatorConfig) -> Self {
        Self {
            config,
            font: None,
            upper_region_fraction: None,
        }
    }

    /// 使用 TrueType 字体绘制标签 (默认使用内置点阵字体)
    pub fn with_font(mut self, font: Option<&'a FontVec>) -> Self {
        self.font = font;
        self
    }

    /// 在每个框内绘制上部分析区域的下边界
    pub fn with_upper_region(mut self, fraction: f32) -> Self {
        self.upper_region_fraction = Some(fraction);
        self
    }

    /// 在副本上绘制并编码, 输入图像不被修改
    pub fn annotate(
        &self,
        image: &RgbImage,
        detections: &[PersonDetection],
    ) -> Result<AnnotatedImage> {
        let mut canvas = image.clone();
        for (i, detection) in detections.iter().enumerate() {
            self.draw_detection(&mut canvas, i + 1, detection);
        }
        self.encode(&canvas)
    }

    fn draw_detection(&self, canvas: &mut RgbImage, index: usize, detection: &PersonDetection) {
        let (img_w, img_h) = canvas.dimensions();
        if img_w == 0 || img_h == 0 {
            return;
        }
        let bbox = detection.bbox.clamp_to(img_w, img_h);
        let color = state_color(detection.hand_state);

        let x = (bbox.x() as u32).min(img_w - 1);
        let y = (bbox.y() as u32).min(img_h - 1);
        let w = (bbox.width() as u32).clamp(1, img_w - x);
        let h = (bbox.height() as u32).clamp(1, img_h - y);

        // 向内加粗
        for t in 0..self.config.line_thickness {
            if 2 * t >= w || 2 * t >= h {
                break;
            }
            let rect = Rect::at((x + t) as i32, (y + t) as i32).of_size(w - 2 * t, h - 2 * t);
            draw_hollow_rect_mut(canvas, rect, color);
        }

        if let Some(fraction) = self.upper_region_fraction {
            let line_y = y as f32 + h as f32 * fraction;
            draw_line_segment_mut(
                canvas,
                (x as f32, line_y),
                ((x + w - 1) as f32, line_y),
                REGION_COLOR,
            );
        }

        let label = format!("#{} {}", index, detection.hand_state.label());
        self.draw_label(canvas, x, y, &label, color);
    }

    /// 标签底色块画在框上方; 框贴近图像顶部时画在框内
    fn draw_label(&self, canvas: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
        let (text_w, text_h) = self.text_size(text);
        let tag_w = text_w + 2 * LABEL_PADDING;
        let tag_h = text_h + 2 * LABEL_PADDING;
        let tag_y = if y >= tag_h { y - tag_h } else { y };

        draw_filled_rect_mut(
            canvas,
            Rect::at(x as i32, tag_y as i32).of_size(tag_w.max(1), tag_h.max(1)),
            color,
        );

        let text_x = (x + LABEL_PADDING) as i32;
        let text_y = (tag_y + LABEL_PADDING) as i32;
        match self.font {
            Some(font) => draw_text_mut(
                canvas,
                LABEL_TEXT_COLOR,
                text_x,
                text_y,
                PxScale::from(self.config.font_scale),
                font,
                text,
            ),
            None => glyphs::draw_text(
                canvas,
                text_x,
                text_y,
                text,
                self.glyph_scale(),
                LABEL_TEXT_COLOR,
            ),
        }
    }

    fn text_size(&self, text: &str) -> (u32, u32) {
        match self.font {
            Some(font) => {
                imageproc::drawing::text_size(PxScale::from(self.config.font_scale), font, text)
            }
            None => glyphs::text_size(text, self.glyph_scale()),
        }
    }

    /// 点阵字体放大倍数, 使字高接近 `font_scale`
    fn glyph_scale(&self) -> u32 {
        ((self.config.font_scale / (glyphs::GLYPH_HEIGHT + 1) as f32).round() as u32).max(1)
    }

    fn encode(&self, canvas: &RgbImage) -> Result<AnnotatedImage> {
        let mut bytes = Vec::new();
        let written = match self.config.format {
            AnnotationFormat::Png => canvas.write_with_encoder(PngEncoder::new(&mut bytes)),
            AnnotationFormat::Jpeg => canvas.write_with_encoder(JpegEncoder::new_with_quality(
                &mut bytes,
                self.config.jpeg_quality,
            )),
        };
        written.map_err(|e| HandCountError::ImageEncode(e.to_string()))?;

        Ok(AnnotatedImage {
            bytes,
            format: self.config.format,
            width: canvas.width(),
            height: canvas.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn sample() -> (RgbImage, Vec<PersonDetection>) {
        let image = RgbImage::from_pixel(120, 160, Rgb([128, 128, 128]));
        let detections = vec![
            PersonDetection::new(
                BoundingBox::new(10.0, 30.0, 40.0, 100.0, 0.9),
                HandState::Raised,
            ),
            PersonDetection::new(
                BoundingBox::new(70.0, 0.0, 40.0, 100.0, 0.8),
                HandState::Down,
            ),
        ];
        (image, detections)
    }

    #[test]
    fn test_png_roundtrip_dimensions() {
        let (image, detections) = sample();
        let config = AnnotatorConfig::default();
        let annotated = Annotator::new(&config).annotate(&image, &detections).unwrap();
        assert_eq!((annotated.width, annotated.height), (120, 160));

        let decoded = image::load_from_memory(&annotated.bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (120, 160));
        // 框的左边线是对应状态的颜色
        assert_eq!(decoded.get_pixel(10, 80), &RAISED_COLOR);
        assert_eq!(decoded.get_pixel(70, 60), &DOWN_COLOR);
        // 框外像素不变
        assert_eq!(decoded.get_pixel(60, 150), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_input_not_mutated() {
        let (image, detections) = sample();
        let before = image.clone();
        let config = AnnotatorConfig::default();
        Annotator::new(&config).annotate(&image, &detections).unwrap();
        assert_eq!(image, before);
    }

    #[test]
    fn test_data_url_prefix() {
        let (image, detections) = sample();
        let config = AnnotatorConfig {
            format: AnnotationFormat::Jpeg,
            ..AnnotatorConfig::default()
        };
        let annotated = Annotator::new(&config).annotate(&image, &detections).unwrap();
        assert!(annotated.to_data_url().starts_with("data:image/jpeg;base64,"));

        let png = AnnotatedImage {
            bytes: vec![1, 2, 3],
            format: AnnotationFormat::Png,
            width: 1,
            height: 1,
        };
        assert_eq!(png.to_data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_upper_region_line() {
        let (image, detections) = sample();
        let config = AnnotatorConfig::default();
        let annotated = Annotator::new(&config)
            .with_upper_region(0.4)
            .annotate(&image, &detections[..1])
            .unwrap();
        let decoded = image::load_from_memory(&annotated.bytes).unwrap().to_rgb8();
        // y = 30 + 100 * 0.4
        assert_eq!(decoded.get_pixel(30, 70), &REGION_COLOR);
    }

    #[test]
    fn test_tiny_and_empty_inputs() {
        let config = AnnotatorConfig::default();
        let image = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let detections = vec![PersonDetection::new(
            BoundingBox::new(3.0, 3.0, 0.0, 0.0, 0.5),
            HandState::Down,
        )];
        assert!(Annotator::new(&config).annotate(&image, &detections).is_ok());
        assert!(Annotator::new(&config).annotate(&image, &[]).is_ok());
    }

    #[test]
    fn test_missing_font_is_configuration_error() {
        assert!(matches!(
            load_font(Path::new("/nonexistent/font.ttf")),
            Err(HandCountError::InvalidConfiguration(_))
        ));
    }
}
