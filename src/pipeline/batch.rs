//! 批处理驱动 (Batch)
//!
//! 输入源是 `Iterator<Item = Result<SourceItem>>` (图片目录或视频抽帧),
//! 模型在构造 Labeler 时已加载, 整个批次复用。

use std::time::Instant;

use anyhow::Result;
use image::RgbImage;
use serde::Serialize;
use tracing::{info, warn};

use super::labeler::{LabelOutcome, Labeler};

/// 输入源的一项 (一张图片或一帧)
#[derive(Debug, Clone)]
pub struct SourceItem {
    pub image: RgbImage,
    /// 指定输出名 (图片目录: 原文件名)
    pub name: Option<String>,
    /// 输出名前缀 (视频: 视频文件名)
    pub prefix: Option<String>,
    /// 日志用的来源描述
    pub origin: String,
}

/// 已处理的一项, 供预览使用
#[derive(Debug, Clone)]
pub struct Processed {
    pub item: SourceItem,
    pub outcome: LabelOutcome,
}

/// 批次统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub seen: usize,
    pub labeled: usize,
    pub background: usize,
    pub skipped: usize,
    pub objects: usize,
    pub aborted: bool,
}

pub struct Batch<S> {
    source: S,
    labeler: Labeler,
    keep_going: bool,
    summary: BatchSummary,
    started: Instant,
}

impl<S> Batch<S>
where
    S: Iterator<Item = Result<SourceItem>>,
{
    pub fn new(source: S, labeler: Labeler, keep_going: bool) -> Self {
        Self {
            source,
            labeler,
            keep_going,
            summary: BatchSummary::default(),
            started: Instant::now(),
        }
    }

    pub fn labeler(&self) -> &Labeler {
        &self.labeler
    }

    pub fn summary(&self) -> &BatchSummary {
        &self.summary
    }

    /// 处理下一项; 输入源结束时返回 None
    ///
    /// 读取失败默认中止批次, `keep_going` 时记录并跳过。写入失败总是中止。
    pub fn step(&mut self) -> Result<Option<Processed>> {
        loop {
            let item = match self.source.next() {
                None => return Ok(None),
                Some(Ok(item)) => item,
                Some(Err(e)) if self.keep_going => {
                    warn!("⚠️ 跳过无法读取的输入: {:#}", e);
                    self.summary.skipped += 1;
                    continue;
                }
                Some(Err(e)) => return Err(e),
            };

            self.summary.seen += 1;
            let outcome =
                self.labeler
                    .label(&item.image, item.name.as_deref(), item.prefix.as_deref())?;
            if outcome.written.is_some() {
                self.summary.labeled += 1;
                self.summary.objects += outcome.detections.len();
            } else if outcome.is_background() {
                self.summary.background += 1;
            }

            return Ok(Some(Processed { item, outcome }));
        }
    }

    /// 无界面运行到输入源结束
    pub fn run(mut self) -> Result<BatchSummary> {
        while self.step()?.is_some() {}
        Ok(self.finish())
    }

    /// 提前结束 (例如预览窗口按下 Esc)
    pub fn abort(mut self) -> BatchSummary {
        self.summary.aborted = true;
        self.finish()
    }

    pub fn finish(self) -> BatchSummary {
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.summary.seen as f64 / elapsed
        } else {
            0.0
        };
        info!(
            "📊 批次结束{}: 处理 {} 项 ({:.1} 项/秒), 写入 {} 项 / {} 个目标, 背景 {} 项, 跳过 {} 项",
            if self.summary.aborted { " (提前终止)" } else { "" },
            self.summary.seen,
            rate,
            self.summary.labeled,
            self.summary.objects,
            self.summary.background,
            self.summary.skipped
        );
        self.summary
    }
}
