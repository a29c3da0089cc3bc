/// 自动标注 (autolabel)
///
/// 用 YOLOv3/YOLOv4 检测结果为图片目录或视频帧生成 VOC 标注:
///   autolabel images ./srcImages -o ./annotations -m yolov4.onnx -f 4 --names coco.names
///   autolabel video ./004.avi -o ./annotations -m yolov3.onnx --gap 10 --preview
use std::process::ExitCode;

use anyhow::Result;
use autolabel_rs::config::Source;
use autolabel_rs::input::ImageDirectory;
use autolabel_rs::models::load_detector;
use autolabel_rs::{
    Args, Batch, BatchSummary, ConfigError, DetectionAdapter, Labeler, OutputNamer,
    RunConfig, SourceItem,
};
use clap::Parser;
use tracing::{error, info};

type ItemSource = Box<dyn Iterator<Item = Result<SourceItem>>>;

fn main() -> ExitCode {
    init_tracing();

    let args = Args::parse();
    match run(&args) {
        Ok(summary) => {
            if summary.aborted {
                info!("👋 已提前结束");
            }
            ExitCode::SUCCESS
        }
        Err(e) => match e.downcast_ref::<ConfigError>() {
            Some(config_error) => {
                error!("❌ 配置错误: {}", config_error);
                ExitCode::from(2)
            }
            None => {
                error!("❌ {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

/// 日志级别默认 info, 可用 RUST_LOG 覆盖
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> Result<BatchSummary> {
    let run = RunConfig::from_args(args)?;
    if run.preview && cfg!(not(feature = "preview")) {
        return Err(ConfigError::FeatureDisabled { feature: "preview" }.into());
    }

    let source = open_source(&run.source)?;

    // 模型在批次开始前加载一次
    let detector = load_detector(&run.detector)?;
    let adapter = DetectionAdapter::new(run.detector.family, detector);
    let labeler = Labeler::new(adapter, OutputNamer::new(&run.output), run.voc.clone())?;
    let batch = Batch::new(source, labeler, run.keep_going);

    if run.preview {
        run_preview(batch, &run)
    } else {
        batch.run()
    }
}

fn open_source(source: &Source) -> Result<ItemSource> {
    match source {
        Source::Images { dir, prefix } => Ok(Box::new(ImageDirectory::open(dir, prefix.clone())?)),
        #[cfg(feature = "video")]
        Source::Video { path, gap } => Ok(Box::new(autolabel_rs::input::VideoFrames::open(
            path, *gap,
        )?)),
        #[cfg(not(feature = "video"))]
        Source::Video { .. } => Err(ConfigError::FeatureDisabled { feature: "video" }.into()),
    }
}

#[cfg(feature = "preview")]
fn run_preview(batch: Batch<ItemSource>, run: &RunConfig) -> Result<BatchSummary> {
    use anyhow::anyhow;
    use autolabel_rs::{overlay, renderer};
    use std::sync::{Arc, Mutex};

    let font = run.font.as_deref().map(overlay::load_font).transpose()?;
    let result = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&result);

    macroquad::Window::from_config(renderer::window_conf(), async move {
        let outcome = renderer::run_with_preview(batch, font).await;
        if let Ok(mut slot) = slot.lock() {
            *slot = Some(outcome);
        }
    });

    let outcome = result
        .lock()
        .map_err(|_| anyhow!("preview result lock poisoned"))?
        .take();
    outcome.unwrap_or_else(|| Err(anyhow!("preview window closed before the batch finished")))
}

#[cfg(not(feature = "preview"))]
fn run_preview(_batch: Batch<ItemSource>, _run: &RunConfig) -> Result<BatchSummary> {
    Err(ConfigError::FeatureDisabled { feature: "preview" }.into())
}
