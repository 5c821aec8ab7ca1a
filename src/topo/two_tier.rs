//! 两层拓扑构建
//!
//! 拓扑结构：
//!
//! ```text
//! backbone:   core ── office0-down ┐
//!               └──── office1-down ┼── ...
//! office_i:   office_i-up ── office_i-bridge ── pc_i_0 / pc_i_1 / ...
//! ```
//!
//! 每个 office 网络挂在 backbone 中对应的下行路由器之下，设备地址为
//! `[下行路由器编号, 设备编号]`。

use crate::net::{ComputerId, NetWorld, NetworkId, NodeKey, Topology, TopologyError};

/// 两层拓扑配置选项
#[derive(Debug, Clone)]
pub struct TwoTierOpts {
    pub offices: usize,
    pub devices_per_office: usize,
}

impl Default for TwoTierOpts {
    fn default() -> Self {
        Self {
            offices: 2,
            devices_per_office: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Office {
    pub network: NetworkId,
    pub downlink: NodeKey,
    pub uplink: NodeKey,
    pub bridge: NodeKey,
    pub devices: Vec<NodeKey>,
}

#[derive(Debug, Clone)]
pub struct TwoTierTopo {
    pub backbone: NetworkId,
    pub core: NodeKey,
    pub offices: Vec<Office>,
}

impl TwoTierTopo {
    /// 第 `office` 个办公室的第 `index` 台设备
    pub fn device(&self, office: usize, index: usize) -> Option<NodeKey> {
        self.offices.get(office)?.devices.get(index).copied()
    }
}

/// 构建两层拓扑
pub fn build_two_tier(topology: &mut Topology, opts: &TwoTierOpts) -> Result<TwoTierTopo, TopologyError> {
    let backbone = topology.add_network("backbone");
    let core = topology.add_bridge("core");

    let mut offices = Vec::with_capacity(opts.offices);
    for o in 0..opts.offices {
        let network = topology.add_network(format!("office{o}"));
        let downlink = topology.add_downlink_router(format!("office{o}-down"));
        let uplink = topology.add_uplink_router(format!("office{o}-up"));
        let bridge = topology.add_bridge(format!("office{o}-bridge"));

        topology.add_connection(backbone, core, downlink)?;
        topology.add_connection(network, uplink, bridge)?;
        let mut devices = Vec::with_capacity(opts.devices_per_office);
        for d in 0..opts.devices_per_office {
            let device = topology.add_device(format!("pc{o}-{d}"));
            topology.add_connection(network, bridge, device)?;
            devices.push(device);
        }
        topology.set_sub_network(downlink, Some(network))?;

        offices.push(Office {
            network,
            downlink,
            uplink,
            bridge,
            devices,
        });
    }

    Ok(TwoTierTopo {
        backbone,
        core,
        offices,
    })
}

/// 构建两层拓扑，并为每台设备添加一台同名计算机
pub fn build_two_tier_world(
    world: &mut NetWorld,
    opts: &TwoTierOpts,
) -> Result<(TwoTierTopo, Vec<Vec<ComputerId>>), TopologyError> {
    let topo = build_two_tier(&mut world.topology, opts)?;
    let mut computers = Vec::with_capacity(topo.offices.len());
    for office in &topo.offices {
        let ids = office
            .devices
            .iter()
            .map(|&d| {
                let name = world
                    .topology
                    .node(d)
                    .map(|n| n.name().to_string())
                    .unwrap_or_default();
                world.add_computer(name, d)
            })
            .collect();
        computers.push(ids);
    }
    Ok((topo, computers))
}
