//! 数据包交付事件
//!
//! 定义网络模拟中的数据包交付事件与每 tick 推进计算机的事件。

use super::net_world::{ComputerId, NetWorld};
use super::packet::Packet;
use crate::sim::{Event, Simulator, World};
use tracing::{trace, warn};

/// 事件：把一个已路由的数据包交给目的计算机的网络模块。
#[derive(Debug)]
pub struct DeliverPacket {
    pub to: ComputerId,
    pub packet: Packet,
}

impl Event for DeliverPacket {
    #[tracing::instrument(skip(self, sim, world), fields(to = ?self.to))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverPacket { to, packet } = *self;
        trace!(now = ?sim.now(), payload = %packet.data, "📨 数据包到达");

        let Some(w) = world.as_any_mut().downcast_mut::<NetWorld>() else {
            warn!("world is not a NetWorld, dropping packet");
            return;
        };
        w.deliver(sim, to, packet);
    }
}

/// 事件：推进所有计算机的网络模块一个 tick，并在下一个 tick 再次调度自己。
#[derive(Debug)]
pub struct TickComputers;

impl Event for TickComputers {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let Some(w) = world.as_any_mut().downcast_mut::<NetWorld>() else {
            warn!("world is not a NetWorld, stopping computer ticks");
            return;
        };
        w.tick_computers(sim);
        sim.schedule_in(1, TickComputers);
    }
}
