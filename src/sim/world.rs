//! 仿真世界
//!
//! 事件只拿到 `&mut dyn World`，需要具体状态时向下转型，例如
//! `world.as_any_mut().downcast_mut::<NetWorld>()`。

use super::simulator::Simulator;
use std::any::Any;

pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// 每个事件执行完之后调用；默认什么也不做
    fn after_event(&mut self, _sim: &mut Simulator) {}
}
