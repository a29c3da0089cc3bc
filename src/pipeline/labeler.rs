//! 标注器 (Labeler)
//! 职责: 图片 → 检测适配器 → 有目标时写 `name.png` + `name.xml`

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use tracing::{debug, info, warn};

use crate::annotation::{write_annotation, AnnotationRecord, OutputName, OutputNamer, VocOptions};
use crate::detection::{BoxXywh, Detection, DetectionAdapter};

/// 单张图片的标注结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelOutcome {
    pub detections: Vec<Detection>,
    /// 写入的文件名; 无目标或前置条件失败时为 None
    pub written: Option<OutputName>,
}

impl LabelOutcome {
    pub fn boxes(&self) -> Vec<BoxXywh> {
        self.detections.iter().map(|d| d.bbox).collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.detections.iter().map(|d| d.label.clone()).collect()
    }

    /// 背景帧: 没有任何检测结果
    pub fn is_background(&self) -> bool {
        self.detections.is_empty()
    }
}

/// 标注器: 持有检测适配器与命名分配器
pub struct Labeler {
    adapter: DetectionAdapter,
    namer: OutputNamer,
    voc: VocOptions,
}

impl Labeler {
    /// 创建标注器并扫描输出目录 (不存在时创建)
    pub fn new(adapter: DetectionAdapter, mut namer: OutputNamer, voc: VocOptions) -> Result<Self> {
        namer
            .initialize()
            .with_context(|| format!("failed to prepare output directory {}", namer.dir().display()))?;
        info!(
            "🏷️ 标注器就绪: {} → {}",
            adapter.family(),
            namer.dir().display()
        );
        Ok(Self {
            adapter,
            namer,
            voc,
        })
    }

    pub fn namer(&self) -> &OutputNamer {
        &self.namer
    }

    pub fn output_dir(&self) -> &Path {
        self.namer.dir()
    }

    /// 标注一张图片
    ///
    /// * `explicit` - 指定输出名 (不占用自动编号)
    /// * `prefix`   - 输出名前缀, 生成 `prefix_xxx`
    pub fn label(
        &mut self,
        image: &RgbImage,
        explicit: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<LabelOutcome> {
        let detections = self.adapter.detect(image)?;
        if detections.is_empty() {
            debug!("背景帧, 跳过");
            return Ok(LabelOutcome::default());
        }

        let name = self.namer.allocate(explicit, prefix)?;
        let labels: Vec<String> = detections.iter().map(|d| d.label.clone()).collect();
        let boxes: Vec<BoxXywh> = detections.iter().map(|d| d.bbox).collect();
        let record = match AnnotationRecord::from_parts(
            name.image_file_name(),
            image.dimensions(),
            &labels,
            &boxes,
            &self.voc,
        ) {
            Ok(record) => record,
            Err(e) => {
                warn!("⚠️ {} 标注中止: {}", name.stem(), e);
                return Ok(LabelOutcome {
                    detections,
                    written: None,
                });
            }
        };

        let dir = self.namer.dir();
        let image_path = name.image_path(dir);
        let xml_path = name.xml_path(dir);
        // 图片和标注必须成对出现, 否则下次扫描会多计一张
        let written = image
            .save_with_format(&image_path, ImageFormat::Png)
            .with_context(|| format!("failed to write {}", image_path.display()))
            .and_then(|_| {
                write_annotation(&xml_path, &record)
                    .with_context(|| format!("failed to write {}", xml_path.display()))
            });
        if let Err(e) = written {
            if fs::remove_file(&image_path).is_ok() {
                debug!("已删除不完整的输出 {}", image_path.display());
            }
            return Err(e);
        }

        self.namer.commit(&name);
        info!("✅ {} 标注完成 ({} 个目标)", xml_path.display(), detections.len());

        Ok(LabelOutcome {
            detections,
            written: Some(name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{ObjectDetector, RawDetections};
    use crate::models::ModelFamily;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// 按顺序返回预设结果的检测器
    struct Scripted(VecDeque<RawDetections>);

    impl ObjectDetector for Scripted {
        fn detect(&mut self, _image: &RgbImage) -> Result<RawDetections> {
            Ok(self.0.pop_front().unwrap_or_default())
        }
    }

    fn labeler(dir: &Path, script: Vec<RawDetections>) -> Labeler {
        let adapter = DetectionAdapter::new(ModelFamily::YoloV3, Box::new(Scripted(script.into())));
        Labeler::new(adapter, OutputNamer::new(dir), VocOptions::default()).unwrap()
    }

    fn person() -> RawDetections {
        let mut raw = RawDetections::default();
        raw.push([10, 10, 60, 70], "person", 0.9);
        raw
    }

    #[test]
    fn test_background_frame_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let mut labeler = labeler(temp.path(), vec![RawDetections::default()]);

        let outcome = labeler.label(&RgbImage::new(8, 8), None, None).unwrap();
        assert!(outcome.is_background());
        assert!(outcome.written.is_none());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
        assert_eq!(labeler.namer().count(), Some(0));
    }

    #[test]
    fn test_detections_write_image_and_xml() {
        let temp = TempDir::new().unwrap();
        let mut labeler = labeler(temp.path(), vec![person()]);

        let outcome = labeler
            .label(&RgbImage::new(100, 80), Some("007"), None)
            .unwrap();
        assert_eq!(outcome.labels(), vec!["person"]);
        assert_eq!(outcome.boxes(), vec![BoxXywh::new(10, 10, 50, 60)]);

        let xml = fs::read_to_string(temp.path().join("007.xml")).unwrap();
        assert!(xml.contains("<filename>007.png</filename>"));
        assert!(xml.contains("<width>100</width>"));
        assert!(xml.contains("<height>80</height>"));
        assert!(xml.contains("<xmax>60</xmax>"));
        assert!(xml.contains("<ymax>70</ymax>"));

        let png = image::open(temp.path().join("007.png")).unwrap();
        assert_eq!((png.width(), png.height()), (100, 80));
    }

    #[test]
    fn test_failed_xml_write_leaves_no_image() {
        let temp = TempDir::new().unwrap();
        // 同名目录占位, 使 XML 写入失败
        fs::create_dir(temp.path().join("000000.xml")).unwrap();
        let mut labeler = labeler(temp.path(), vec![person()]);

        assert!(labeler.label(&RgbImage::new(100, 80), None, None).is_err());
        assert!(!temp.path().join("000000.png").exists());
        assert_eq!(labeler.namer().count(), Some(0));
    }

    #[test]
    fn test_ragged_detector_output_is_an_error() {
        let temp = TempDir::new().unwrap();
        let raw = RawDetections {
            boxes: vec![[0, 0, 1, 1], [0, 0, 2, 2]],
            labels: vec!["a".to_string()],
            confidences: vec![0.5],
        };
        let mut labeler = labeler(temp.path(), vec![raw]);

        assert!(labeler.label(&RgbImage::new(4, 4), None, None).is_err());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
