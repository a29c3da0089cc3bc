//! 配置: 命令行参数 + JSON配置文件
//!
//! 命令行优先于配置文件, 合并后在任何处理开始前校验为 `RunConfig`。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::annotation::VocOptions;
use crate::error::ConfigError;
use crate::models::{DetectorSettings, ModelFamily};

/// 自动标注参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "自动标注 - 用 YOLO 检测结果生成 VOC 标注", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// 标注输出目录 (不存在时自动创建)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// ONNX 模型路径
    #[arg(short, long, global = true)]
    pub model: Option<PathBuf>,

    /// 模型系列: 3 = YOLOv3, 4 = YOLOv4
    #[arg(short, long, global = true, allow_negative_numbers = true)]
    pub family: Option<i64>,

    /// 类别名文件 (每行一个)
    #[arg(long, global = true)]
    pub names: Option<PathBuf>,

    /// 置信度阈值
    #[arg(long, global = true)]
    pub conf: Option<f32>,

    /// NMS IOU阈值
    #[arg(long, global = true)]
    pub iou: Option<f32>,

    /// 网络输入尺寸
    #[arg(long, global = true)]
    pub input_size: Option<u32>,

    /// JSON配置文件
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 显示预览窗口 (Esc 提前结束)
    #[arg(long, global = true)]
    pub preview: bool,

    /// 跳过无法读取的图片/帧, 不中止整个批次
    #[arg(long, global = true)]
    pub keep_going: bool,

    /// 预览标签字体 (ttf/otf)
    #[arg(long, global = true)]
    pub font: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// 标注目录下的所有图片, 以原文件名命名输出
    Images {
        /// 待标注图片目录
        source: PathBuf,

        /// 输出文件名前缀
        #[arg(long)]
        prefix: Option<String>,
    },
    /// 每隔 N 帧标注一次视频, 以视频文件名为前缀自动编号
    Video {
        /// 视频文件路径
        source: PathBuf,

        /// 抽帧间隔
        #[arg(short, long)]
        gap: Option<u32>,
    },
}

/// JSON配置文件
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    // === 检测参数 ===
    pub model: Option<PathBuf>,
    pub family: i64, // 3 = YOLOv3, 4 = YOLOv4
    pub names: Option<PathBuf>,
    pub conf: Option<f32>, // 为空时使用模型系列推荐值
    pub iou: Option<f32>,
    pub input_size: Option<u32>,

    // === 输出参数 ===
    pub output: PathBuf,
    pub gap: u32,
    pub voc: VocOptions,

    // === 批处理 ===
    pub keep_going: bool,
    pub font: Option<PathBuf>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            model: None,
            family: 3,
            names: None,
            conf: None,
            iou: None,
            input_size: None,
            output: PathBuf::from("annotations"),
            gap: 10,
            voc: VocOptions::default(),
            keep_going: false,
            font: None,
        }
    }
}

impl LabelConfig {
    /// 从JSON文件加载配置, 文件不存在时返回 None (不写文件)
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(json) => {
                let config = serde_json::from_str(&json)
                    .with_context(|| format!("failed to parse config {}", path.display()))?;
                info!("✅ 配置已从 {} 加载", path.display());
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read config {}", path.display()))
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }
}

/// 输入源 (已校验)
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Images { dir: PathBuf, prefix: Option<String> },
    Video { path: PathBuf, gap: u32 },
}

impl Source {
    pub fn path(&self) -> &Path {
        match self {
            Source::Images { dir, .. } => dir,
            Source::Video { path, .. } => path,
        }
    }
}

/// 校验后的运行配置
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub source: Source,
    pub output: PathBuf,
    pub detector: DetectorSettings,
    pub voc: VocOptions,
    pub keep_going: bool,
    pub preview: bool,
    pub font: Option<PathBuf>,
}

impl RunConfig {
    /// 读取 `--config` 指定的配置文件并校验
    ///
    /// 配置文件不存在时使用默认值, 校验通过后才写出默认配置。
    pub fn from_args(args: &Args) -> Result<Self> {
        let Some(path) = &args.config else {
            return Ok(Self::resolve(args, LabelConfig::default())?);
        };

        match LabelConfig::load(path)? {
            Some(file) => Ok(Self::resolve(args, file)?),
            None => {
                let file = LabelConfig::default();
                let run = Self::resolve(args, file.clone())?;
                info!("📝 配置文件不存在, 创建默认配置 {}", path.display());
                file.save(path)?;
                Ok(run)
            }
        }
    }

    /// 合并命令行与配置文件并校验
    ///
    /// 只读检查 (不创建目录、不加载模型), 失败时没有任何副作用。
    pub fn resolve(args: &Args, file: LabelConfig) -> Result<Self, ConfigError> {
        let family = ModelFamily::try_from(args.family.unwrap_or(file.family))?;

        let conf = args
            .conf
            .or(file.conf)
            .unwrap_or_else(|| family.default_conf_threshold());
        check_threshold("confidence", conf)?;
        let iou = args
            .iou
            .or(file.iou)
            .unwrap_or_else(|| family.default_iou_threshold());
        check_threshold("iou", iou)?;

        let input_size = args
            .input_size
            .or(file.input_size)
            .unwrap_or_else(|| family.default_input_size());
        if input_size == 0 || input_size % 32 != 0 {
            return Err(ConfigError::InvalidInputSize(input_size));
        }

        let model = args
            .model
            .clone()
            .or(file.model)
            .ok_or(ConfigError::MissingModel)?;

        let source = match &args.command {
            Command::Images { source, prefix } => Source::Images {
                dir: source.clone(),
                prefix: prefix.clone(),
            },
            Command::Video { source, gap } => {
                let gap = gap.unwrap_or(file.gap);
                if gap == 0 {
                    return Err(ConfigError::ZeroGap);
                }
                Source::Video {
                    path: source.clone(),
                    gap,
                }
            }
        };
        if !source.path().exists() {
            return Err(ConfigError::SourceNotFound(source.path().to_path_buf()));
        }

        Ok(Self {
            source,
            output: args.output.clone().unwrap_or(file.output),
            detector: DetectorSettings {
                family,
                model,
                names: args.names.clone().or(file.names),
                input_size,
                conf,
                iou,
            },
            voc: file.voc,
            keep_going: args.keep_going || file.keep_going,
            preview: args.preview,
            font: args.font.clone().or(file.font),
        })
    }
}

fn check_threshold(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}
