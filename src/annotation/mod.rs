/// 标注输出 (Annotation Output)
///
/// - voc:    VOC XML 标注记录与序列化
/// - naming: 输出目录计数与文件命名
pub mod naming;
pub mod voc;

pub use naming::{OutputName, OutputNamer};
pub use voc::{write_annotation, AnnotatedObject, AnnotationRecord, VocOptions};
