//! 仿真时间类型
//!
//! 整个子系统只使用离散的 tick 计时，不依赖任何墙钟时间。

use serde::{Deserialize, Serialize};

/// 仿真时间（tick）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// 向后推移 `ticks` 个 tick（饱和加法）
    pub fn after(self, ticks: u64) -> Tick {
        Tick(self.0.saturating_add(ticks))
    }

    /// 下一个 tick
    pub fn next(self) -> Tick {
        self.after(1)
    }
}
