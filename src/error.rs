//! 错误类型定义
//!
//! 配置错误在任何处理开始前返回; 标注前置条件错误只中止当前写入。

use std::path::PathBuf;

use thiserror::Error;

/// 配置校验错误 (在加载模型、创建目录之前返回)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown model family {0} (expected 3 for YOLOv3 or 4 for YOLOv4)")]
    UnknownModelFamily(i64),

    #[error("frame gap must be at least 1")]
    ZeroGap,

    #[error("{name} threshold {value} is outside [0, 1]")]
    ThresholdOutOfRange { name: &'static str, value: f32 },

    #[error("input size must be a positive multiple of 32, got {0}")]
    InvalidInputSize(u32),

    #[error("model path is required (pass --model or set `model` in the config file)")]
    MissingModel,

    #[error("source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("this build has no `{feature}` support (rebuild with `--features {feature}`)")]
    FeatureDisabled { feature: &'static str },
}

/// 标注记录的前置条件错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("annotation for {0} has no objects")]
    NoObjects(String),

    #[error("{labels} labels but {boxes} boxes")]
    LengthMismatch { labels: usize, boxes: usize },
}

/// 输出命名错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("output directory {0} has not been scanned yet")]
    Unread(PathBuf),
}
