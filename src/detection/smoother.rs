//! 时间平滑器 (Temporal smoother)
//!
//! 逐帧消费原始威胁判定, 输出去抖后的稳定报警状态:
//! 1. 判定压入固定长度滑动窗口 (默认 10 帧), 挤出最旧一帧
//! 2. 窗口内命中数 ≥ 布防阈值 (默认 2) → 布防, 保持期计数器重置满值
//! 3. 多数判定失败但保持期未耗尽 → 继续布防, 计数器递减
//! 4. 否则撤防
//!
//! 2-of-10 即布防换取低漏报, 保持期防止报警闪烁。

use std::collections::VecDeque;

/// 默认窗口长度 K
pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// 默认布防阈值 (窗口内命中数)
pub const DEFAULT_ARM_THRESHOLD: usize = 2;

/// 默认保持期 (帧)
pub const DEFAULT_HOLD_PERIOD: u32 = 10;

/// 报警状态机: IDLE → ACTIVE (窗口多数) → HOLDING (保持期) → IDLE
///
/// 状态仅由主循环线程每帧推进一次, 不跨线程共享。
pub struct TemporalSmoother {
    window: VecDeque<bool>,
    window_size: usize,
    arm_threshold: usize,
    hold_period: u32,
    hold_counter: u32,
    stabilized: bool,
    previous_stabilized: bool,
}

impl Default for TemporalSmoother {
    fn default() -> Self {
        Self::new(
            DEFAULT_WINDOW_SIZE,
            DEFAULT_ARM_THRESHOLD,
            DEFAULT_HOLD_PERIOD,
        )
    }
}

impl TemporalSmoother {
    pub fn new(window_size: usize, arm_threshold: usize, hold_period: u32) -> Self {
        let window_size = window_size.max(1);
        Self {
            // 初始窗口全 false
            window: VecDeque::from(vec![false; window_size]),
            window_size,
            arm_threshold: arm_threshold.max(1),
            hold_period,
            hold_counter: 0,
            stabilized: false,
            previous_stabilized: false,
        }
    }

    /// 每帧调用一次, 返回平滑后的报警状态
    pub fn update(&mut self, raw_threat: bool) -> bool {
        self.previous_stabilized = self.stabilized;

        self.window.pop_front();
        self.window.push_back(raw_threat);
        debug_assert_eq!(self.window.len(), self.window_size);

        let hits = self.window.iter().filter(|v| **v).count();
        if hits >= self.arm_threshold {
            self.hold_counter = self.hold_period;
            self.stabilized = true;
        } else if self.hold_counter > 0 {
            self.hold_counter -= 1;
            self.stabilized = true;
        } else {
            self.stabilized = false;
        }

        self.stabilized
    }

    pub fn stabilized(&self) -> bool {
        self.stabilized
    }

    /// 本帧是否发生了稳定状态翻转
    pub fn is_edge(&self) -> bool {
        self.stabilized != self.previous_stabilized
    }

    pub fn hold_counter(&self) -> u32 {
        self.hold_counter
    }
}
