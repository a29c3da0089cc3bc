// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测模型系列与加载
//!
//! # 架构说明
//!
//! 标注流程只依赖 `detection::ObjectDetector` trait。
//! 具体后端:
//! - **Darknet YOLOv3 / YOLOv4** (ONNX 导出): `darknet.rs`
//!   - 预处理 (preprocess) / 输出解码 (decode) 总是可用
//!   - 推理会话 (`DarknetYolo`) 需要 `onnx` 功能
//!
//! ## 使用示例
//! ```ignore
//! let family = ModelFamily::try_from(4)?;
//! let detector = load_detector(&settings)?; // 一个批次只加载一次
//! ```
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::detection::ObjectDetector;
use crate::error::ConfigError;

pub mod darknet;

#[cfg(feature = "onnx")]
pub use darknet::DarknetYolo;

/// 模型系列 (封闭枚举: 3 = YOLOv3, 4 = YOLOv4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    YoloV3,
    YoloV4,
}

impl ModelFamily {
    /// 推荐的网络输入尺寸
    pub fn default_input_size(&self) -> u32 {
        match self {
            ModelFamily::YoloV3 => 416,
            ModelFamily::YoloV4 => 608,
        }
    }

    /// 推荐的置信度阈值
    pub fn default_conf_threshold(&self) -> f32 {
        match self {
            ModelFamily::YoloV3 => 0.5,
            ModelFamily::YoloV4 => 0.4,
        }
    }

    /// 推荐的IOU阈值
    pub fn default_iou_threshold(&self) -> f32 {
        0.45
    }

    pub fn selector(&self) -> i64 {
        match self {
            ModelFamily::YoloV3 => 3,
            ModelFamily::YoloV4 => 4,
        }
    }
}

impl TryFrom<i64> for ModelFamily {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(ModelFamily::YoloV3),
            4 => Ok(ModelFamily::YoloV4),
            other => Err(ConfigError::UnknownModelFamily(other)),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::YoloV3 => f.write_str("YOLOv3"),
            ModelFamily::YoloV4 => f.write_str("YOLOv4"),
        }
    }
}

/// 检测器参数 (已校验)
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub family: ModelFamily,
    pub model: PathBuf,
    pub names: Option<PathBuf>,
    pub input_size: u32,
    pub conf: f32,
    pub iou: f32,
}

/// 读取类别名文件 (每行一个, 忽略空行)
pub fn load_class_names(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read class names from {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// 类别ID → 名称, 缺失时回退为 `class{id}`
pub fn class_name(names: &[String], id: usize) -> String {
    names
        .get(id)
        .cloned()
        .unwrap_or_else(|| format!("class{}", id))
}

/// 加载检测模型 (每个批次调用一次)
#[cfg(feature = "onnx")]
pub fn load_detector(settings: &DetectorSettings) -> Result<Box<dyn ObjectDetector>> {
    let names = match &settings.names {
        Some(path) => load_class_names(path)?,
        None => Vec::new(),
    };
    let model = DarknetYolo::new(settings, names)?;
    model.summary();
    Ok(Box::new(model))
}

#[cfg(not(feature = "onnx"))]
pub fn load_detector(_settings: &DetectorSettings) -> Result<Box<dyn ObjectDetector>> {
    Err(ConfigError::FeatureDisabled { feature: "onnx" }.into())
}
