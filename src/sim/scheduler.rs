//! 按 tick 推进的可取消定时器
//!
//! 每个 socket 持有一个自己的 `Scheduler`，在每个仿真 tick 调用一次
//! [`Scheduler::advance`]，然后用 [`Scheduler::pop_due`] 逐个取出到期的定时器。
//! 逐个取出意味着处理某个定时器时取消的其他定时器不会再被交付。

use super::scheduled::Scheduled;
use super::time::Tick;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, BinaryHeap};

/// 定时器句柄，用于取消。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduler<T> {
    now: Tick,
    next_seq: u64,
    timers: BinaryHeap<Scheduled<T>>,
    /// 已取消但仍留在堆中的定时器（惰性删除）
    cancelled: BTreeSet<u64>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: Tick::ZERO,
            next_seq: 0,
            timers: BinaryHeap::new(),
            cancelled: BTreeSet::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn now(&self) -> Tick {
        self.now
    }

    /// 在 `delay` 个 tick 之后触发；`delay == 0` 表示当前 tick 即到期。
    pub fn schedule_in(&mut self, delay: u64, item: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.timers.push(Scheduled {
            at: self.now.after(delay),
            seq,
            item,
        });
        TimerId(seq)
    }

    /// 取消一个尚未触发的定时器，返回它此前是否处于挂起状态。
    pub fn cancel(&mut self, id: TimerId) -> bool {
        if !self.is_pending(id) {
            return false;
        }
        self.cancelled.insert(id.0)
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
        self.cancelled.clear();
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        !self.cancelled.contains(&id.0) && self.timers.iter().any(|e| e.seq == id.0)
    }

    /// 挂起（未取消）的定时器数量
    pub fn pending(&self) -> usize {
        self.timers.len() - self.cancelled.len()
    }

    /// 前进一个 tick。
    pub fn advance(&mut self) -> Tick {
        self.now = self.now.next();
        self.now
    }

    /// 取出下一个已到期且未被取消的定时器。
    pub fn pop_due(&mut self) -> Option<T> {
        while let Some(top) = self.timers.peek() {
            if top.at > self.now {
                return None;
            }
            let entry = self.timers.pop()?;
            if self.cancelled.remove(&entry.seq) {
                continue;
            }
            return Some(entry.item);
        }
        None
    }
}
