//! VOC 格式标注文件
//!
//! 固定的 XML 结构, 逐字节输出 (制表符缩进, 无尾随换行), 不含时间戳。

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::detection::BoxXywh;
use crate::error::AnnotationError;

/// 标注的固定字段 (每个目标相同)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocOptions {
    pub folder: String,
    pub database: String,
    pub depth: u32,
    pub truncated: u32,
    pub difficult: u32,
}

impl Default for VocOptions {
    fn default() -> Self {
        Self {
            folder: "voc format".to_string(),
            database: "autolabel".to_string(),
            depth: 3,
            truncated: 0,
            difficult: 0,
        }
    }
}

/// 单个目标
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedObject {
    pub name: String,
    pub truncated: u32,
    pub difficult: u32,
    pub bndbox: BoxXywh,
}

/// 一张图片的标注记录
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationRecord {
    pub folder: String,
    pub filename: String,
    pub database: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub objects: Vec<AnnotatedObject>,
}

impl AnnotationRecord {
    /// 由平行的标签/框序列构建记录
    ///
    /// 空目标列表或长度不一致都属于前置条件错误。
    pub fn from_parts(
        filename: impl Into<String>,
        (width, height): (u32, u32),
        labels: &[String],
        boxes: &[BoxXywh],
        options: &VocOptions,
    ) -> Result<Self, AnnotationError> {
        let filename = filename.into();
        if labels.len() != boxes.len() {
            return Err(AnnotationError::LengthMismatch {
                labels: labels.len(),
                boxes: boxes.len(),
            });
        }
        if labels.is_empty() {
            return Err(AnnotationError::NoObjects(filename));
        }

        let objects = labels
            .iter()
            .zip(boxes)
            .map(|(name, bndbox)| AnnotatedObject {
                name: name.clone(),
                truncated: options.truncated,
                difficult: options.difficult,
                bndbox: *bndbox,
            })
            .collect();

        Ok(Self {
            folder: options.folder.clone(),
            filename,
            database: options.database.clone(),
            width,
            height,
            depth: options.depth,
            objects,
        })
    }

    /// 序列化为 XML 文本
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(512 + self.objects.len() * 256);
        // 写入 String 不会失败
        let _ = self.write_xml(&mut xml);
        xml
    }

    fn write_xml(&self, xml: &mut String) -> std::fmt::Result {
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<annotation>\n");
        writeln!(xml, "\t<folder>{}</folder>", escape(&self.folder))?;
        writeln!(xml, "\t<filename>{}</filename>", escape(&self.filename))?;
        writeln!(xml, "\t<path>{}</path>", escape(&self.filename))?;
        xml.push_str("\t<source>\n");
        writeln!(xml, "\t\t<database>{}</database>", escape(&self.database))?;
        xml.push_str("\t</source>\n");
        xml.push_str("\t<size>\n");
        writeln!(xml, "\t\t<width>{}</width>", self.width)?;
        writeln!(xml, "\t\t<height>{}</height>", self.height)?;
        writeln!(xml, "\t\t<depth>{}</depth>", self.depth)?;
        xml.push_str("\t</size>\n");
        xml.push_str("\t<segmented>0</segmented>\n");

        for object in &self.objects {
            let b = &object.bndbox;
            xml.push_str("\t<object>\n");
            writeln!(xml, "\t\t<name>{}</name>", escape(&object.name))?;
            xml.push_str("\t\t<pose>Unspecified</pose>\n");
            writeln!(xml, "\t\t<truncated>{}</truncated>", object.truncated)?;
            writeln!(xml, "\t\t<difficult>{}</difficult>", object.difficult)?;
            xml.push_str("\t\t<bndbox>\n");
            writeln!(xml, "\t\t\t<xmin>{}</xmin>", b.xmin())?;
            writeln!(xml, "\t\t\t<ymin>{}</ymin>", b.ymin())?;
            writeln!(xml, "\t\t\t<xmax>{}</xmax>", b.xmax())?;
            writeln!(xml, "\t\t\t<ymax>{}</ymax>", b.ymax())?;
            xml.push_str("\t\t</bndbox>\n");
            xml.push_str("\t</object>\n");
        }

        xml.push_str("</annotation>");
        Ok(())
    }
}

/// 写入标注文件 (覆盖已有文件; 目录不存在时返回IO错误)
pub fn write_annotation(path: &Path, record: &AnnotationRecord) -> std::io::Result<()> {
    fs::write(path, record.to_xml())?;
    debug!("📝 {} 写入完成", path.display());
    Ok(())
}

fn escape(text: &str) -> std::borrow::Cow<'_, str> {
    if !text.contains(['&', '<', '>']) {
        return std::borrow::Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    std::borrow::Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn person_record() -> AnnotationRecord {
        AnnotationRecord::from_parts(
            "007.png",
            (608, 608),
            &["person".to_string()],
            &[BoxXywh::new(10, 10, 50, 60)],
            &VocOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_exact_layout() {
        let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<annotation>\n\
\t<folder>voc format</folder>\n\
\t<filename>007.png</filename>\n\
\t<path>007.png</path>\n\
\t<source>\n\
\t\t<database>autolabel</database>\n\
\t</source>\n\
\t<size>\n\
\t\t<width>608</width>\n\
\t\t<height>608</height>\n\
\t\t<depth>3</depth>\n\
\t</size>\n\
\t<segmented>0</segmented>\n\
\t<object>\n\
\t\t<name>person</name>\n\
\t\t<pose>Unspecified</pose>\n\
\t\t<truncated>0</truncated>\n\
\t\t<difficult>0</difficult>\n\
\t\t<bndbox>\n\
\t\t\t<xmin>10</xmin>\n\
\t\t\t<ymin>10</ymin>\n\
\t\t\t<xmax>60</xmax>\n\
\t\t\t<ymax>70</ymax>\n\
\t\t</bndbox>\n\
\t</object>\n\
</annotation>";
        assert_eq!(person_record().to_xml(), expected);
    }

    #[test]
    fn test_out_of_bounds_boxes_are_not_clamped() {
        let record = AnnotationRecord::from_parts(
            "edge.png",
            (100, 100),
            &["car".to_string()],
            &[BoxXywh::new(-5, 90, 20, 30)],
            &VocOptions::default(),
        )
        .unwrap();
        let xml = record.to_xml();
        assert!(xml.contains("<xmin>-5</xmin>"));
        assert!(xml.contains("<ymax>120</ymax>"));
    }

    #[test]
    fn test_precondition_errors() {
        let options = VocOptions::default();
        let empty = AnnotationRecord::from_parts("a.png", (1, 1), &[], &[], &options);
        assert_eq!(empty, Err(AnnotationError::NoObjects("a.png".to_string())));

        let ragged = AnnotationRecord::from_parts(
            "a.png",
            (1, 1),
            &["x".to_string(), "y".to_string()],
            &[BoxXywh::default()],
            &options,
        );
        assert_eq!(
            ragged,
            Err(AnnotationError::LengthMismatch {
                labels: 2,
                boxes: 1
            })
        );
    }

    #[test]
    fn test_text_is_escaped() {
        let record = AnnotationRecord::from_parts(
            "a&b.png",
            (1, 1),
            &["salt & pepper".to_string()],
            &[BoxXywh::default()],
            &VocOptions::default(),
        )
        .unwrap();
        let xml = record.to_xml();
        assert!(xml.contains("<filename>a&amp;b.png</filename>"));
        assert!(xml.contains("<name>salt &amp; pepper</name>"));
    }

    #[test]
    fn test_write_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("007.xml");
        let record = person_record();

        write_annotation(&path, &record).unwrap();
        let first = fs::read(&path).unwrap();
        write_annotation(&path, &record).unwrap();
        let second = fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("007.xml");
        assert!(write_annotation(&path, &person_record()).is_err());
    }
}
