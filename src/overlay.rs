//! 预览叠加层: 在图片上画检测框和类别名

use std::fs;
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detection::Detection;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LINE_WIDTH: i32 = 2;
const LABEL_SCALE: f32 = 18.0;

/// 加载标签字体 (ttf/otf)
pub fn load_font(path: &Path) -> Result<FontArc> {
    let data =
        fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
    FontArc::try_from_vec(data).with_context(|| format!("invalid font {}", path.display()))
}

/// 一个检测框的标签文字, 锚点为框的左上角 (原图像素坐标)
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    pub x: i32,
    pub y: i32,
}

fn is_drawable(det: &Detection) -> bool {
    det.bbox.width > 0 && det.bbox.height > 0
}

/// 可绘制检测框的标签 `label conf`, 与 `draw_detections` 画出的框一一对应
pub fn captions(detections: &[Detection]) -> Vec<Caption> {
    detections
        .iter()
        .filter(|det| is_drawable(det))
        .map(|det| Caption {
            text: format!("{} {:.2}", det.label, det.confidence),
            x: det.bbox.x,
            y: det.bbox.y,
        })
        .collect()
}

/// 复制图片并画出所有检测框; 有字体时把标签直接画进图片
///
/// 宽或高不为正的框跳过, 超出图片的部分由 imageproc 裁剪。
/// 没有字体时由调用方用 `captions` 自行绘制标签。
pub fn draw_detections(
    image: &RgbImage,
    detections: &[Detection],
    font: Option<&FontArc>,
) -> RgbImage {
    let mut canvas = image.clone();
    for det in detections.iter().filter(|det| is_drawable(det)) {
        let bbox = det.bbox;

        // 向内加粗
        for t in 0..LINE_WIDTH.min(bbox.width / 2).min(bbox.height / 2).max(1) {
            let rect = Rect::at(bbox.x + t, bbox.y + t).of_size(
                (bbox.width - 2 * t).max(1) as u32,
                (bbox.height - 2 * t).max(1) as u32,
            );
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
        }
    }

    if let Some(font) = font {
        for caption in captions(detections) {
            let y = (caption.y - LABEL_SCALE as i32).max(0);
            draw_text_mut(
                &mut canvas,
                LABEL_COLOR,
                caption.x,
                y,
                PxScale::from(LABEL_SCALE),
                font,
                &caption.text,
            );
        }
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoxXywh;

    fn det(x: i32, y: i32, w: i32, h: i32) -> Detection {
        Detection {
            label: "person".to_string(),
            bbox: BoxXywh::new(x, y, w, h),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_box_outline_is_drawn() {
        let image = RgbImage::new(40, 30);
        let out = draw_detections(&image, &[det(5, 5, 20, 10)], None);

        assert_eq!(out.get_pixel(5, 5), &BOX_COLOR);
        assert_eq!(out.get_pixel(24, 14), &BOX_COLOR);
        assert_eq!(out.get_pixel(6, 6), &BOX_COLOR);
        // 框内部和原图不变
        assert_eq!(out.get_pixel(15, 10), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(5, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_degenerate_and_outside_boxes() {
        let image = RgbImage::new(10, 10);
        let out = draw_detections(&image, &[det(2, 2, 0, 5), det(-5, -5, 8, 8)], None);

        assert_eq!(out.get_pixel(2, 4), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(2, 0), &BOX_COLOR);
    }

    #[test]
    fn test_captions_follow_drawn_boxes() {
        let mut car = det(30, 12, 8, 6);
        car.label = "car".to_string();
        car.confidence = 0.456;

        let caps = captions(&[det(5, 5, 20, 10), det(2, 2, 0, 5), car]);
        assert_eq!(
            caps,
            vec![
                Caption {
                    text: "person 0.90".to_string(),
                    x: 5,
                    y: 5,
                },
                Caption {
                    text: "car 0.46".to_string(),
                    x: 30,
                    y: 12,
                },
            ]
        );
    }

    #[test]
    fn test_no_font_leaves_text_to_caller() {
        let image = RgbImage::new(40, 40);
        let out = draw_detections(&image, &[det(10, 20, 10, 10)], None);
        // 框上方的标签区域保持原样
        assert!((0..40).all(|x| (0..20).all(|y| out.get_pixel(x, y) == &Rgb([0, 0, 0]))));
        assert_eq!(captions(&[det(10, 20, 10, 10)]).len(), 1);
    }

    #[test]
    fn test_missing_font() {
        assert!(load_font(Path::new("/does/not/exist.ttf")).is_err());
    }
}
