//! 网络世界实现
//!
//! `NetWorld` 把拓扑和一组计算机放在一起：每台计算机有一个设备节点、一个
//! 网络模块和一块网卡。网卡发出的数据包先按拓扑路由，再按跳数延迟交付。

use super::deliver_packet::{DeliverPacket, TickComputers};
use super::id::{NetId, NodeKey};
use super::packet::{Address, Packet};
use super::stats::Stats;
use super::topology::Topology;
use crate::proto::{NetModule, NodeNetInterface};
use crate::sim::{Simulator, World};
use serde::{Deserialize, Serialize};
use std::any::Any;
use tracing::{debug, info, trace};

/// 计算机句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComputerId(pub usize);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// 每经过一跳增加的交付延迟（tick）
    pub ticks_per_hop: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self { ticks_per_hop: 1 }
    }
}

/// 计算机网卡：缓存本机地址，并暂存待路由的出站数据包
#[derive(Debug, Default)]
pub struct DeviceInterface {
    net_id: Option<NetId>,
    outbox: Vec<Packet>,
}

impl NodeNetInterface for DeviceInterface {
    fn net_id(&self) -> Option<NetId> {
        self.net_id.clone()
    }

    fn process(&mut self, packet: Packet) {
        self.outbox.push(packet);
    }
}

#[derive(Debug)]
pub struct Computer {
    name: String,
    device: NodeKey,
    powered: bool,
    net: NetModule,
    nic: DeviceInterface,
}

impl Computer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> NodeKey {
        self.device
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn net_module(&self) -> &NetModule {
        &self.net
    }
}

/// 网络仿真世界
#[derive(Default)]
pub struct NetWorld {
    pub topology: Topology,
    pub config: WorldConfig,
    pub stats: Stats,
    computers: Vec<Computer>,
}

impl World for NetWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl NetWorld {
    pub fn new(topology: Topology, config: WorldConfig) -> Self {
        Self {
            topology,
            config,
            stats: Stats::default(),
            computers: Vec::new(),
        }
    }

    /// 添加一台计算机，其网卡是设备节点 `device`
    pub fn add_computer(&mut self, name: impl Into<String>, device: NodeKey) -> ComputerId {
        self.add_computer_with(name, device, NetModule::default())
    }

    pub fn add_computer_with(&mut self, name: impl Into<String>, device: NodeKey, net: NetModule) -> ComputerId {
        let id = ComputerId(self.computers.len());
        self.computers.push(Computer {
            name: name.into(),
            device,
            powered: true,
            net,
            nic: DeviceInterface::default(),
        });
        id
    }

    pub fn computer(&self, id: ComputerId) -> Option<&Computer> {
        self.computers.get(id.0)
    }

    pub fn computers(&self) -> impl Iterator<Item = (ComputerId, &Computer)> {
        self.computers.iter().enumerate().map(|(i, c)| (ComputerId(i), c))
    }

    pub fn computer_by_name(&self, name: &str) -> Option<ComputerId> {
        self.computers.iter().position(|c| c.name == name).map(ComputerId)
    }

    pub fn computer_by_device(&self, device: NodeKey) -> Option<ComputerId> {
        self.computers.iter().position(|c| c.device == device).map(ComputerId)
    }

    /// 计算机在 `port` 上的 socket 地址
    pub fn address_of(&self, id: ComputerId, port: u16) -> Option<Address> {
        let device = self.computer(id)?.device;
        Some(Address::new(self.topology.device_net_id(device)?, port))
    }

    /// 从下一个 tick 开始，每个 tick 推进一次所有计算机
    pub fn start(&mut self, sim: &mut Simulator) {
        info!(computers = self.computers.len(), "▶️  启动计算机时钟");
        sim.schedule_in(1, TickComputers);
    }

    /// 以计算机的网卡访问它的网络模块；产生的出站数据包随后被路由。
    pub fn with_net_module<F, R>(&mut self, sim: &mut Simulator, id: ComputerId, f: F) -> Option<R>
    where
        F: FnOnce(&mut NetModule, &mut dyn NodeNetInterface) -> R,
    {
        let computer = self.computers.get_mut(id.0)?;
        computer.nic.net_id = self.topology.device_net_id(computer.device);
        let result = f(&mut computer.net, &mut computer.nic);
        self.flush_outbox(sim, id);
        Some(result)
    }

    /// 开关机。关机会停止网络模块并拆除所有 socket。
    pub fn set_powered(&mut self, sim: &mut Simulator, id: ComputerId, powered: bool) {
        let Some(computer) = self.computers.get_mut(id.0) else {
            return;
        };
        info!(computer = %computer.name, powered, "💡 切换电源");
        computer.powered = powered;
        computer.nic.net_id = self.topology.device_net_id(computer.device);
        computer.net.set_running(&mut computer.nic, powered);
        self.flush_outbox(sim, id);
    }

    pub(crate) fn tick_computers(&mut self, sim: &mut Simulator) {
        for i in 0..self.computers.len() {
            let computer = &mut self.computers[i];
            if !computer.powered {
                continue;
            }
            computer.nic.net_id = self.topology.device_net_id(computer.device);
            computer.net.update(&mut computer.nic);
            self.flush_outbox(sim, ComputerId(i));
        }
    }

    #[tracing::instrument(skip(self, sim, packet), fields(to = ?to))]
    pub(crate) fn deliver(&mut self, sim: &mut Simulator, to: ComputerId, packet: Packet) {
        let Some(computer) = self.computers.get_mut(to.0) else {
            self.stats.dropped_pkts += 1;
            return;
        };
        if !computer.powered {
            debug!(computer = %computer.name, "目的计算机已关机，丢弃");
            self.stats.dropped_pkts += 1;
            return;
        }
        computer.nic.net_id = self.topology.device_net_id(computer.device);
        computer.net.handle(&mut computer.nic, packet);
        self.stats.delivered_pkts += 1;
        self.flush_outbox(sim, to);
    }

    /// 路由并调度计算机网卡中暂存的所有出站数据包
    fn flush_outbox(&mut self, sim: &mut Simulator, from: ComputerId) {
        let Some(computer) = self.computers.get_mut(from.0) else {
            return;
        };
        let device = computer.device;
        let outbox = std::mem::take(&mut computer.nic.outbox);
        for packet in outbox {
            let path = match self.topology.route(device, &packet.destination.net_id) {
                Ok(path) => path,
                Err(err) => {
                    debug!(error = %err, "路由失败，丢弃数据包");
                    self.stats.dropped_pkts += 1;
                    continue;
                }
            };
            let Some(to) = path.last().and_then(|&d| self.computer_by_device(d)) else {
                debug!("目的设备上没有计算机，丢弃数据包");
                self.stats.dropped_pkts += 1;
                continue;
            };
            let hops = path.len().saturating_sub(1) as u64;
            let delay = hops.saturating_mul(self.config.ticks_per_hop);
            trace!(hops, delay, to = ?to, "调度数据包交付");
            self.stats.sent_pkts += 1;
            sim.schedule_in(delay, DeliverPacket { to, packet });
        }
    }
}
