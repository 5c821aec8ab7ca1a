//! 世界级事件
//!
//! 数据包交付（`DeliverPacket`）与计算机时钟（`TickComputers`）都是事件。
//! 事件持有 `Rc` 等非 `Send` 数据也没有问题：整个仿真只在一个线程里推进。

use super::simulator::Simulator;
use super::world::World;

/// 可被调度的事件。执行时消费自身（`self: Box<Self>`），可以把负载直接移交给世界。
pub trait Event: 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);

    /// 日志中使用的事件名
    fn label(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
