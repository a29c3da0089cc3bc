/// 抽帧计数器: 帧号从1开始, 第 k 帧在 `k % gap == 0` 时处理
#[derive(Debug, Clone)]
pub struct FrameSampler {
    gap: u32,
    frame_num: u64,
}

impl FrameSampler {
    /// `gap` 为 0 时按 1 处理 (配置校验已拒绝 0)
    pub fn new(gap: u32) -> Self {
        Self {
            gap: gap.max(1),
            frame_num: 0,
        }
    }

    /// 记录一帧, 返回该帧是否需要处理
    pub fn accept(&mut self) -> bool {
        self.frame_num += 1;
        self.frame_num % u64::from(self.gap) == 0
    }

    /// 已经过的帧数
    pub fn frame_num(&self) -> u64 {
        self.frame_num
    }

    pub fn gap(&self) -> u32 {
        self.gap
    }
}
