/// 检测系统数据结构定义
/// Data structures shared by the detector backends and the labeling pipeline

// ========== 数据结构 ==========

/// 像素坐标矩形, 原点 + 宽高 (x, y, w, h)
///
/// 坐标相对于原图左上角, 不做边界裁剪。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoxXywh {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoxXywh {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 角点形式 (x1, y1, x2, y2) → (x1, y1, x2 - x1, y2 - y1), 溢出时饱和
    pub fn from_corners([x1, y1, x2, y2]: [i32; 4]) -> Self {
        Self::new(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1))
    }

    pub fn xmin(&self) -> i32 {
        self.x
    }

    pub fn ymin(&self) -> i32 {
        self.y
    }

    pub fn xmax(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn ymax(&self) -> i32 {
        self.y.saturating_add(self.height)
    }
}

/// 单个检测目标 (检测适配器 → 标注流程)
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub bbox: BoxXywh,
    pub confidence: f32,
}

/// 检测器原始输出: 三个平行序列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDetections {
    pub boxes: Vec<[i32; 4]>, // (x1, y1, x2, y2)
    pub labels: Vec<String>,
    pub confidences: Vec<f32>,
}

impl RawDetections {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn push(&mut self, corners: [i32; 4], label: impl Into<String>, confidence: f32) {
        self.boxes.push(corners);
        self.labels.push(label.into());
        self.confidences.push(confidence);
    }
}

/// 检测框 (推理后端内部使用, 浮点像素坐标)
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ScoredBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl ScoredBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn intersection_area(&self, another: &ScoredBox) -> f32 {
        let l = self.x1.max(another.x1);
        let r = self.x2.min(another.x2);
        let t = self.y1.max(another.y1);
        let b = self.y2.min(another.y2);
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn iou(&self, another: &ScoredBox) -> f32 {
        let inter = self.intersection_area(another);
        let union = self.area() + another.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// 四舍五入到整数像素角点
    pub fn corners(&self) -> [i32; 4] {
        [
            self.x1.round() as i32,
            self.y1.round() as i32,
            self.x2.round() as i32,
            self.y2.round() as i32,
        ]
    }
}
