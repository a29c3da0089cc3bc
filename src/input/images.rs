//! 图片目录输入

use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::file_stem;
use crate::pipeline::SourceItem;

/// 按文件系统枚举顺序遍历目录中的图片, 跳过子目录
pub struct ImageDirectory {
    dir: PathBuf,
    entries: ReadDir,
    prefix: Option<String>,
}

impl ImageDirectory {
    pub fn open(dir: impl AsRef<Path>, prefix: Option<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let entries =
            fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))?;
        info!("📂 图片目录: {}", dir.display());
        Ok(Self {
            dir,
            entries,
            prefix,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load(&self, path: PathBuf) -> Result<SourceItem> {
        let image = image::open(&path)
            .with_context(|| format!("failed to decode image {}", path.display()))?
            .to_rgb8();
        Ok(SourceItem {
            image,
            name: file_stem(&path),
            prefix: self.prefix.clone(),
            origin: path.display().to_string(),
        })
    }
}

impl Iterator for ImageDirectory {
    type Item = Result<SourceItem>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    return Some(
                        Err(e).with_context(|| format!("failed to list {}", self.dir.display())),
                    )
                }
            };
            let path = entry.path();
            if path.is_dir() {
                debug!("跳过子目录 {}", path.display());
                continue;
            }
            return Some(self.load(path));
        }
    }
}
