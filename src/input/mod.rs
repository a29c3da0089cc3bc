/// 输入源 (Input Sources)
///
/// 每个输入源都是 `Iterator<Item = Result<SourceItem>>`, 交给 `pipeline::Batch`:
/// - ImageDirectory: 目录下的图片, 以原文件名命名输出
/// - VideoFrames:    视频按间隔抽帧, 以视频文件名为前缀 (需要 `video` 功能)
/// - FrameSampler:   抽帧计数
pub mod images;
pub mod sampler;

#[cfg(feature = "video")]
pub mod decode_filter;
#[cfg(feature = "video")]
pub mod video;

pub use images::ImageDirectory;
pub use sampler::FrameSampler;

#[cfg(feature = "video")]
pub use decode_filter::DecodeFilter;
#[cfg(feature = "video")]
pub use video::VideoFrames;

use std::path::Path;

/// 文件名去掉扩展名 (非UTF-8字符做有损转换)
pub(crate) fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}
