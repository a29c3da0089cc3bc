//! 视频输入: 独立解码线程 + 有界通道

use std::path::Path;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use tracing::{debug, error, info};

use super::decode_filter::{DecodeFilter, DecodedFrame};
use super::file_stem;
use crate::pipeline::SourceItem;

/// 解码线程与标注线程之间最多缓存的帧数
const FRAME_QUEUE: usize = 4;

/// 视频抽帧输入, 以视频文件名为输出前缀
pub struct VideoFrames {
    rx: Receiver<Result<DecodedFrame>>,
    prefix: String,
    decoder: Option<JoinHandle<()>>,
}

impl VideoFrames {
    pub fn open(path: impl AsRef<Path>, gap: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let prefix = file_stem(&path)
            .with_context(|| format!("video path has no file name: {}", path.display()))?;
        let url = path
            .to_str()
            .with_context(|| format!("video path is not valid UTF-8: {}", path.display()))?
            .to_string();

        let (tx, rx) = bounded(FRAME_QUEUE);
        let decoder = thread::Builder::new()
            .name("video-decode".to_string())
            .spawn(move || decode(url, gap, tx))
            .context("failed to spawn decoder thread")?;

        info!("🎬 视频: {} (间隔 {} 帧, 前缀 {})", path.display(), gap, prefix);
        Ok(Self {
            rx,
            prefix,
            decoder: Some(decoder),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

fn decode(url: String, gap: u32, tx: Sender<Result<DecodedFrame>>) {
    if let Err(e) = run_decoder(&url, gap, tx.clone()) {
        error!("❌ 解码失败: {:#}", e);
        let _ = tx.send(Err(e));
    }
}

fn run_decoder(url: &str, gap: u32, tx: Sender<Result<DecodedFrame>>) -> Result<()> {
    let filter = DecodeFilter::new(gap, tx);
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("decode", Box::new(filter));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = FfmpegContext::builder()
        .input(Input::new(url))
        .filter_descs(["format=rgb24"].into())
        .output(out)
        .build()
        .map_err(|e| anyhow!("failed to open video {}: {}", url, e))?;

    let sch = ctx
        .start()
        .map_err(|e| anyhow!("failed to start decoding {}: {}", url, e))?;
    // 接收端提前关闭时过滤器返回错误, 这里不视为失败
    if let Err(e) = sch.wait() {
        debug!("解码结束: {}", e);
    }
    Ok(())
}

impl Iterator for VideoFrames {
    type Item = Result<SourceItem>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rx.recv() {
            Ok(Ok(DecodedFrame { frame_num, image })) => Some(Ok(SourceItem {
                image,
                name: None,
                prefix: Some(self.prefix.clone()),
                origin: format!("{} #{}", self.prefix, frame_num),
            })),
            Ok(Err(e)) => Some(Err(e)),
            Err(_) => {
                // 所有发送端已释放: 视频结束
                if let Some(handle) = self.decoder.take() {
                    if handle.join().is_err() {
                        return Some(Err(anyhow!("decoder thread panicked")));
                    }
                }
                None
            }
        }
    }
}
