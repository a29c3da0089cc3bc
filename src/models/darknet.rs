// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// Darknet YOLOv3 / YOLOv4 (ONNX 导出) 检测模型
// 包含: 预处理、推理、输出解码
//
// 输入:  [1, 3, S, S]  RGB, 0~1, 直接缩放 (无 letterbox)
// 输出0: boxes [1, N, 1, 4]  归一化 x1, y1, x2, y2
// 输出1: confs [1, N, C]     每个类别的置信度

use anyhow::{ensure, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, ArrayViewD, Ix4};

use crate::{non_max_suppression, ScoredBox};

/// 预处理: 图片 → NCHW 张量
pub fn preprocess(image: &RgbImage, input_size: u32) -> Array<f32, Ix4> {
    let resized = image::imageops::resize(image, input_size, input_size, FilterType::Triangle);
    let size = input_size as usize;
    let mut xs = Array::zeros((1, 3, size, size));
    for (x, y, rgb) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = rgb.0;
        xs[[0, 0, y, x]] = (r as f32) / 255.0;
        xs[[0, 1, y, x]] = (g as f32) / 255.0;
        xs[[0, 2, y, x]] = (b as f32) / 255.0;
    }
    xs
}

/// 后处理: 原始输出 → 原图像素坐标的检测框 (已做NMS)
pub fn decode(
    boxes: ArrayViewD<f32>,
    confs: ArrayViewD<f32>,
    image_size: (u32, u32),
    conf_threshold: f32,
    iou_threshold: f32,
) -> Result<Vec<ScoredBox>> {
    let nc = confs.shape().last().copied().unwrap_or(0);
    ensure!(nc > 0, "confs output has no class dimension: {:?}", confs.shape());
    ensure!(
        boxes.len() % 4 == 0,
        "boxes output is not a multiple of 4: {:?}",
        boxes.shape()
    );

    let coords: Vec<f32> = boxes.iter().copied().collect();
    let scores: Vec<f32> = confs.iter().copied().collect();
    let n = coords.len() / 4;
    ensure!(
        scores.len() == n * nc,
        "boxes {:?} and confs {:?} disagree on the number of candidates",
        boxes.shape(),
        confs.shape()
    );

    let (w0, h0) = (image_size.0 as f32, image_size.1 as f32);
    let mut data: Vec<ScoredBox> = Vec::new();
    for (bbox, clss) in coords.chunks_exact(4).zip(scores.chunks_exact(nc)) {
        let Some((class_id, &confidence)) = clss
            .iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };

        if confidence < conf_threshold {
            continue;
        }

        data.push(ScoredBox {
            x1: bbox[0] * w0,
            y1: bbox[1] * h0,
            x2: bbox[2] * w0,
            y2: bbox[3] * h0,
            confidence,
            class_id,
        });
    }

    non_max_suppression(&mut data, iou_threshold);
    Ok(data)
}

#[cfg(feature = "onnx")]
mod session {
    use anyhow::{Context, Result};
    use image::RgbImage;
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Tensor;
    use tracing::{debug, info};

    use super::{decode, preprocess};
    use crate::detection::{ObjectDetector, RawDetections};
    use crate::models::{class_name, DetectorSettings, ModelFamily};

    /// Darknet YOLO 推理模型 (ONNX Runtime)
    pub struct DarknetYolo {
        session: Session,
        family: ModelFamily,
        input_size: u32,
        conf: f32,
        iou: f32,
        names: Vec<String>,
    }

    impl DarknetYolo {
        /// 加载模型权重 (较重, 每个批次只做一次)
        pub fn new(settings: &DetectorSettings, names: Vec<String>) -> Result<Self> {
            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .commit_from_file(&settings.model)
                .with_context(|| format!("failed to load model {}", settings.model.display()))?;

            Ok(Self {
                session,
                family: settings.family,
                input_size: settings.input_size,
                conf: settings.conf,
                iou: settings.iou,
                names,
            })
        }

        pub fn summary(&self) {
            info!(
                "📦 {} 模型已加载: input {}x{}, classes {}, conf {}, iou {}",
                self.family,
                self.input_size,
                self.input_size,
                self.names.len(),
                self.conf,
                self.iou
            );
        }
    }

    impl ObjectDetector for DarknetYolo {
        fn detect(&mut self, image: &RgbImage) -> Result<RawDetections> {
            let t_pre = std::time::Instant::now();
            let xs = preprocess(image, self.input_size);
            let input = Tensor::from_array(xs)?;

            let t_run = std::time::Instant::now();
            let outputs = self.session.run(ort::inputs![input]?)?;
            let boxes = outputs[0].try_extract_tensor::<f32>()?;
            let confs = outputs[1].try_extract_tensor::<f32>()?;

            let t_post = std::time::Instant::now();
            let ys = decode(boxes, confs, image.dimensions(), self.conf, self.iou)?;
            debug!(
                "[{}] pre {:?} / run {:?} / post {:?}",
                self.family,
                t_run - t_pre,
                t_post - t_run,
                t_post.elapsed()
            );

            let mut raw = RawDetections::default();
            for y in ys {
                raw.push(y.corners(), class_name(&self.names, y.class_id), y.confidence);
            }
            Ok(raw)
        }
    }
}

#[cfg(feature = "onnx")]
pub use session::DarknetYolo;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_scales_to_unit_range() {
        let image = RgbImage::from_pixel(20, 10, image::Rgb([255, 0, 51]));
        let xs = preprocess(&image, 32);
        assert_eq!(xs.shape(), &[1, 3, 32, 32]);
        assert!((xs[[0, 0, 5, 5]] - 1.0).abs() < 1e-6);
        assert!(xs[[0, 1, 5, 5]].abs() < 1e-6);
        assert!((xs[[0, 2, 5, 5]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn decode_filters_scales_and_suppresses() {
        // 三个候选: 两个重叠的 person, 一个低分 car
        let boxes = Array::from_shape_vec(
            (1, 3, 1, 4),
            vec![
                0.1, 0.1, 0.5, 0.5, //
                0.12, 0.1, 0.5, 0.52, //
                0.6, 0.6, 0.9, 0.9,
            ],
        )
        .unwrap()
        .into_dyn();
        let confs = Array::from_shape_vec((1, 3, 2), vec![0.9, 0.1, 0.8, 0.1, 0.2, 0.3])
            .unwrap()
            .into_dyn();

        let ys = decode(boxes.view(), confs.view(), (100, 200), 0.5, 0.45).unwrap();
        assert_eq!(ys.len(), 1);
        assert_eq!(ys[0].class_id, 0);
        assert_eq!(ys[0].corners(), [10, 20, 50, 100]);
    }

    #[test]
    fn decode_rejects_mismatched_outputs() {
        let boxes = Array::<f32, _>::zeros((1, 2, 1, 4)).into_dyn();
        let confs = Array::<f32, _>::zeros((1, 3, 80)).into_dyn();
        assert!(decode(boxes.view(), confs.view(), (10, 10), 0.5, 0.45).is_err());
    }
}
