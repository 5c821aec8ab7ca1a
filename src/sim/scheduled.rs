//! 按 tick 排序的调度条目
//!
//! 世界级事件队列与 socket 级定时器共用同一个排序规则：先比较触发 tick，
//! 同一 tick 内按调度顺序（`seq`）先进先出。

use super::time::Tick;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 调度条目：触发时间、序列号和负载。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduled<T> {
    pub(crate) at: Tick,
    pub(crate) seq: u64,
    pub(crate) item: T,
}

// BinaryHeap 是 max-heap；我们需要最小 tick 优先，因此反向比较。
impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
            .reverse()
    }
}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<T> Eq for Scheduled<T> {}
