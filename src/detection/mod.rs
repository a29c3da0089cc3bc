/// 检测适配层 (Detection Adapter)
///
/// 把外部检测器包装成统一接口:
/// - ObjectDetector:   外部检测器 trait (图片 → 角点框/标签/置信度)
/// - DetectionAdapter: 绑定一个模型系列, 把角点框转换为 (x, y, w, h)
pub mod types;

use anyhow::{bail, Result};
use image::RgbImage;

use crate::models::ModelFamily;
pub use types::{BoxXywh, Detection, RawDetections, ScoredBox};

/// 外部检测器接口
///
/// 模型权重在构造时加载一次, 之后每帧只调用 `detect`。
pub trait ObjectDetector {
    /// 检测一张图片, 返回三个平行序列 (boxes 为 x1, y1, x2, y2)
    fn detect(&mut self, image: &RgbImage) -> Result<RawDetections>;
}

/// 检测适配器: 一个批次内固定使用同一个模型系列
pub struct DetectionAdapter {
    family: ModelFamily,
    detector: Box<dyn ObjectDetector>,
}

impl DetectionAdapter {
    pub fn new(family: ModelFamily, detector: Box<dyn ObjectDetector>) -> Self {
        Self { family, detector }
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    /// 检测并转换为 (label, (x, y, w, h), confidence)
    ///
    /// 置信度原样保留, 下游不使用。
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let raw = self.detector.detect(image)?;
        if raw.boxes.len() != raw.labels.len() || raw.confidences.len() != raw.labels.len() {
            bail!(
                "{} detector returned {} boxes, {} labels and {} confidences",
                self.family,
                raw.boxes.len(),
                raw.labels.len(),
                raw.confidences.len()
            );
        }

        Ok(raw
            .boxes
            .into_iter()
            .zip(raw.labels)
            .zip(raw.confidences)
            .map(|((corners, label), confidence)| Detection {
                label,
                bbox: BoxXywh::from_corners(corners),
                confidence,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(RawDetections);

    impl ObjectDetector for Fixed {
        fn detect(&mut self, _image: &RgbImage) -> Result<RawDetections> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn adapter_converts_corner_boxes() {
        let mut raw = RawDetections::default();
        raw.push([10, 10, 50, 60], "person", 0.8);
        let mut adapter = DetectionAdapter::new(ModelFamily::YoloV3, Box::new(Fixed(raw)));

        let detections = adapter.detect(&RgbImage::new(4, 4)).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "person");
        assert_eq!(detections[0].bbox, BoxXywh::new(10, 10, 40, 50));
    }

    #[test]
    fn adapter_rejects_ragged_output() {
        let raw = RawDetections {
            boxes: vec![[0, 0, 1, 1]],
            labels: vec![],
            confidences: vec![0.5],
        };
        let mut adapter = DetectionAdapter::new(ModelFamily::YoloV4, Box::new(Fixed(raw)));
        assert!(adapter.detect(&RgbImage::new(4, 4)).is_err());
    }
}
