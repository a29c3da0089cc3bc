// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod annotation; // VOC 标注写入与输出命名
pub mod config; // 命令行与JSON配置
pub mod detection; // 检测适配层
pub mod error; // 错误类型
pub mod input; // 图片目录 / 视频输入
pub mod models; // 模型系列与推理后端
pub mod overlay; // 检测结果叠加绘制
pub mod pipeline; // 标注流程与批处理

#[cfg(feature = "preview")]
pub mod renderer; // macroquad 预览窗口

pub use crate::annotation::{AnnotationRecord, OutputName, OutputNamer, VocOptions};
pub use crate::config::{Args, LabelConfig, RunConfig};
pub use crate::detection::{
    BoxXywh, Detection, DetectionAdapter, ObjectDetector, RawDetections, ScoredBox,
};
pub use crate::error::{AnnotationError, ConfigError, NamingError};
pub use crate::models::{DetectorSettings, ModelFamily};
pub use crate::pipeline::{Batch, BatchSummary, LabelOutcome, Labeler, SourceItem};

/// 按类别做非极大值抑制, 保留置信度高的框 (结果按置信度降序)
pub fn non_max_suppression(xs: &mut Vec<ScoredBox>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence.total_cmp(&b1.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].class_id != xs[index].class_id {
                continue;
            }
            let iou = xs[prev_index].iou(&xs[index]);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}
