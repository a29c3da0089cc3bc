/// FFmpeg解码过滤器: 视频文件 → 抽帧 → RGB帧
use anyhow::Result;
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::sampler::FrameSampler;

/// 解码后送给标注线程的一帧
pub struct DecodedFrame {
    /// 帧号 (从1开始)
    pub frame_num: u64,
    pub image: RgbImage,
}

/// 上游需配置 `format=rgb24`, 本过滤器只转换被抽中的帧
pub struct DecodeFilter {
    sampler: FrameSampler,
    tx: Sender<Result<DecodedFrame>>,
    sent: usize,
    dropped_frames: usize,
    last: Instant,
}

impl DecodeFilter {
    pub fn new(gap: u32, tx: Sender<Result<DecodedFrame>>) -> Self {
        Self {
            sampler: FrameSampler::new(gap),
            tx,
            sent: 0,
            dropped_frames: 0,
            last: Instant::now(),
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        info!("✅ 解码线程启动 (每 {} 帧抽取一帧)", self.sampler.gap());
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        if !self.sampler.accept() {
            return Ok(Some(frame));
        }
        let frame_num = self.sampler.frame_num();

        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                warn!("⚠️ 丢弃帧 #{}: 空帧/损坏帧", frame_num);
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            let data = (*frame.as_ptr()).data[0];
            let stride = (*frame.as_ptr()).linesize[0] as usize;
            let row_bytes = w as usize * 3;

            if w == 0 || h == 0 || data.is_null() || stride < row_bytes {
                self.dropped_frames += 1;
                warn!(
                    "⚠️ 丢弃帧 #{}: 非法帧 {}x{} stride={}",
                    frame_num, w, h, stride
                );
                return Ok(None);
            }

            // 按行拷贝, 去掉 stride 对齐填充
            let mut rgb = Vec::with_capacity(row_bytes * h as usize);
            for row in 0..h as usize {
                let line = std::slice::from_raw_parts(data.add(row * stride), row_bytes);
                rgb.extend_from_slice(line);
            }

            let Some(image) = RgbImage::from_raw(w, h, rgb) else {
                return Err(format!("frame #{} has an unexpected size", frame_num));
            };

            // 接收端已关闭 (批次结束或 Esc), 停止解码
            if self
                .tx
                .send(Ok(DecodedFrame { frame_num, image }))
                .is_err()
            {
                debug!("接收端已关闭, 停止解码");
                return Err("consumer closed".to_string());
            }
        }

        self.sent += 1;
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            debug!(
                "📺 解码统计: 已读 {} 帧 | 抽取 {} 帧 | 丢弃 {}",
                self.sampler.frame_num(),
                self.sent,
                self.dropped_frames
            );
            self.last = Instant::now();
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        info!(
            "✅ 解码线程退出: 共 {} 帧, 抽取 {} 帧",
            self.sampler.frame_num(),
            self.sent
        );
    }
}
