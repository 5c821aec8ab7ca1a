//! 仿真器
//!
//! 世界级的离散事件仿真器：维护当前 tick 与事件队列。

use super::event::Event;
use super::scheduled::Scheduled;
use super::time::Tick;
use super::world::World;
use std::collections::BinaryHeap;
use tracing::{debug, info, trace};

/// 事件驱动仿真器：维护当前 tick 与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: Tick,
    next_seq: u64,
    q: BinaryHeap<Scheduled<Box<dyn Event>>>,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> Tick {
        self.now
    }

    /// 队列中尚未执行的事件数量
    pub fn pending(&self) -> usize {
        self.q.len()
    }

    /// 调度事件在指定 tick 执行；早于当前 tick 的时间会被钳到当前 tick。
    #[tracing::instrument(skip(self, ev), fields(event_type = std::any::type_name::<E>(), schedule_at = ?at))]
    pub fn schedule<E: Event>(&mut self, at: Tick, ev: E) {
        let seq = self.next_seq;
        let at = at.max(self.now);
        trace!(now = ?self.now, seq, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(Scheduled {
            at,
            seq,
            item: Box::new(ev),
        });
    }

    /// 在 `delay` 个 tick 之后执行事件
    pub fn schedule_in<E: Event>(&mut self, delay: u64, ev: E) {
        self.schedule(self.now.after(delay), ev);
    }

    /// 运行直到事件队列为空或到达 `until`。
    #[tracing::instrument(skip(self, world))]
    pub fn run_until(&mut self, until: Tick, world: &mut dyn World) {
        debug!(now = ?self.now, queue_size = self.q.len(), "▶️  运行到指定 tick");
        while let Some(top) = self.q.peek() {
            if top.at > until {
                break;
            }
            let Some(entry) = self.q.pop() else {
                break;
            };
            self.now = entry.at;
            entry.item.execute(self, world);
            world.after_event(self);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    ///
    /// 带有自我重复调度事件（例如 `TickComputers`）的世界永远不会排空，
    /// 这类世界应使用 [`Simulator::run_until`]。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!("▶️  开始运行仿真");

        let mut event_count = 0u64;
        while let Some(entry) = self.q.pop() {
            event_count += 1;
            self.now = entry.at;
            trace!(event_num = event_count, now = ?self.now, seq = entry.seq, event = entry.item.label(), "执行事件");
            entry.item.execute(self, world);
            world.after_event(self);
        }

        info!(total_events = event_count, final_time = ?self.now, "✅ 仿真完成");
    }
}
