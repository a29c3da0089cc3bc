//! 输出命名 (Output Naming)
//!
//! 首次使用前扫描一次输出目录, 统计已有的 png 文件数作为起始编号,
//! 之后只在内存中递增, 不再重新扫描。单线程独占使用。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::NamingError;

/// 计数状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tally {
    /// 尚未读取输出目录
    Unread,
    Counted(usize),
}

/// 一次分配得到的文件名 (不含扩展名)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputName {
    stem: String,
    numbered: bool,
}

impl OutputName {
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// 是否占用了自动编号
    pub fn is_numbered(&self) -> bool {
        self.numbered
    }

    pub fn image_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.png", self.stem))
    }

    pub fn xml_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.xml", self.stem))
    }

    /// 写入 XML `<filename>` 的图片名
    pub fn image_file_name(&self) -> String {
        format!("{}.png", self.stem)
    }
}

/// 输出目录命名分配器
#[derive(Debug)]
pub struct OutputNamer {
    dir: PathBuf,
    tally: Tally,
}

impl OutputNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tally: Tally::Unread,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 当前计数, 未初始化时为 None
    pub fn count(&self) -> Option<usize> {
        match self.tally {
            Tally::Unread => None,
            Tally::Counted(n) => Some(n),
        }
    }

    /// 扫描输出目录 (只执行一次)
    ///
    /// 目录不存在时创建, 计数为 0; 否则统计扩展名包含 "png" 的条目 (区分大小写)。
    pub fn initialize(&mut self) -> io::Result<usize> {
        if let Tally::Counted(n) = self.tally {
            return Ok(n);
        }

        let n = match fs::read_dir(&self.dir) {
            Ok(entries) => {
                let mut n = 0;
                for entry in entries {
                    let entry = entry?;
                    if is_counted_image(&entry.path()) {
                        n += 1;
                    }
                }
                n
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&self.dir)?;
                info!("📁 创建输出目录 {}", self.dir.display());
                0
            }
            Err(e) => return Err(e),
        };

        info!("📁 输出目录 {} 已有 {} 张图片", self.dir.display(), n);
        self.tally = Tally::Counted(n);
        Ok(n)
    }

    /// 生成下一个文件名 (不改变计数)
    ///
    /// - 自动编号: `000123` / `prefix_000123`
    /// - 指定名字: `name` / `prefix_name`, 不占用编号
    pub fn allocate(
        &self,
        explicit: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<OutputName, NamingError> {
        let n = self
            .count()
            .ok_or_else(|| NamingError::Unread(self.dir.clone()))?;

        let (base, numbered) = match explicit {
            Some(name) => (name.to_string(), false),
            None => (format!("{:06}", n), true),
        };
        let stem = match prefix {
            Some(prefix) => format!("{}_{}", prefix, base),
            None => base,
        };
        Ok(OutputName { stem, numbered })
    }

    /// 文件写入成功后提交; 自动编号的名字使计数加 1
    pub fn commit(&mut self, name: &OutputName) {
        if let Tally::Counted(n) = self.tally {
            if name.numbered {
                self.tally = Tally::Counted(n + 1);
            }
        }
    }
}

fn is_counted_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().contains("png"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_allocate_before_initialize_fails() {
        let namer = OutputNamer::new("/nonexistent/out");
        assert!(matches!(
            namer.allocate(None, None),
            Err(NamingError::Unread(_))
        ));
    }

    #[test]
    fn test_missing_directory_is_created() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("annotations").join("run1");
        let mut namer = OutputNamer::new(&dir);

        assert_eq!(namer.initialize().unwrap(), 0);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_prefixed_numbering_sequence() {
        let temp = TempDir::new().unwrap();
        let mut namer = OutputNamer::new(temp.path());
        namer.initialize().unwrap();

        let first = namer.allocate(None, Some("hsh")).unwrap();
        assert_eq!(first.stem(), "hsh_000000");
        namer.commit(&first);

        let second = namer.allocate(None, Some("hsh")).unwrap();
        assert_eq!(second.stem(), "hsh_000001");
    }

    #[test]
    fn test_uncommitted_allocation_does_not_consume() {
        let temp = TempDir::new().unwrap();
        let mut namer = OutputNamer::new(temp.path());
        namer.initialize().unwrap();

        let _ = namer.allocate(None, None).unwrap();
        assert_eq!(namer.allocate(None, None).unwrap().stem(), "000000");
        assert_eq!(namer.count(), Some(0));
    }

    #[test]
    fn test_explicit_names_bypass_counter() {
        let temp = TempDir::new().unwrap();
        let mut namer = OutputNamer::new(temp.path());
        namer.initialize().unwrap();

        let plain = namer.allocate(Some("007"), None).unwrap();
        assert_eq!(plain.stem(), "007");
        let prefixed = namer.allocate(Some("007"), Some("cam")).unwrap();
        assert_eq!(prefixed.stem(), "cam_007");

        namer.commit(&prefixed);
        assert_eq!(namer.count(), Some(0));
    }

    #[test]
    fn test_existing_png_files_are_counted() {
        let temp = TempDir::new().unwrap();
        for name in ["a.png", "b.png", "b.xml", "c.PNG", "d.apng", "notes"] {
            fs::write(temp.path().join(name), b"").unwrap();
        }
        let mut namer = OutputNamer::new(temp.path());

        // 扩展名包含 "png" (区分大小写): a.png, b.png, d.apng
        assert_eq!(namer.initialize().unwrap(), 3);
        assert_eq!(namer.allocate(None, None).unwrap().stem(), "000003");
    }

    #[test]
    fn test_initialize_scans_once() {
        let temp = TempDir::new().unwrap();
        let mut namer = OutputNamer::new(temp.path());
        namer.initialize().unwrap();

        fs::write(temp.path().join("late.png"), b"").unwrap();
        assert_eq!(namer.initialize().unwrap(), 0);
    }

    #[test]
    fn test_output_paths() {
        let temp = TempDir::new().unwrap();
        let mut namer = OutputNamer::new(temp.path());
        namer.initialize().unwrap();

        let name = namer.allocate(Some("007"), None).unwrap();
        assert_eq!(name.image_path(temp.path()), temp.path().join("007.png"));
        assert_eq!(name.xml_path(temp.path()), temp.path().join("007.xml"));
        assert_eq!(name.image_file_name(), "007.png");
    }
}
