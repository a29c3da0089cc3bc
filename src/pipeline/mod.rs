/// 标注流水线 (Labeling Pipeline)
///
/// 单线程同步处理:
/// - Labeler: 单张图片 → 检测 → (有目标时) 分配名字, 写图片与标注
/// - Batch:   遍历输入源, 逐项调用 Labeler, 统计结果
pub mod batch;
pub mod labeler;

pub use batch::{Batch, BatchSummary, Processed, SourceItem};
pub use labeler::{LabelOutcome, Labeler};
