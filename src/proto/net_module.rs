//! 每台计算机的网络模块
//!
//! `NetModule` 持有本机所有存活的 socket（每个端口至多一个），负责分配端口，
//! 并通过网卡（[`NodeNetInterface`]）收发数据包。被拆除的 socket 在每次操作后
//! 立即移出存活集合。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use super::handler::PacketHandler;
use super::host::{CounterSequence, NodeNetInterface, SequenceGenerator, SocketHost};
use super::socket::{Socket, SocketConfig, SocketState};
use crate::net::{Address, NetId, Packet, Payload};

/// 临时端口从这里开始分配
pub const EPHEMERAL_PORT_START: u16 = 49152;

/// socket 在所属模块内的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SocketId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetModuleError {
    #[error("unknown socket {0:?}")]
    UnknownSocket(SocketId),

    #[error("port {0} is already in use")]
    PortInUse(u16),

    #[error("no free port left")]
    PortsExhausted,

    #[error("socket {0:?} must be disconnected to be reconfigured")]
    SocketBusy(SocketId),
}

/// 把一个负载包装成 tcp 数据包并交给宿主发送。宿主没有地址时丢弃。
pub(crate) fn send_tcp(host: &mut dyn SocketHost, local_port: u16, destination: &Address, data: Payload) -> bool {
    let Some(net_id) = host.local_net_id() else {
        debug!(port = local_port, "本机没有网络地址，丢弃数据包");
        return false;
    };
    let packet = Packet::tcp(Address::new(net_id, local_port), destination.clone(), data);
    trace!(to = %packet.destination, payload = %packet.data, "发送 tcp 数据包");
    host.transmit(packet);
    true
}

/// 模块运行 socket 时提供给它们的宿主
struct ModuleHost<'a> {
    iface: &'a mut dyn NodeNetInterface,
    sequence: &'a mut dyn SequenceGenerator,
}

impl SocketHost for ModuleHost<'_> {
    fn local_net_id(&self) -> Option<NetId> {
        self.iface.net_id()
    }

    fn next_sequence(&mut self, local_port: u16) -> u32 {
        self.sequence.next_sequence(local_port)
    }

    fn transmit(&mut self, packet: Packet) {
        self.iface.process(packet);
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NetModule {
    config: SocketConfig,
    running: bool,
    next_socket: u64,
    sockets: BTreeMap<SocketId, Socket>,
    #[serde(skip, default = "default_sequence")]
    sequence: Box<dyn SequenceGenerator>,
}

fn default_sequence() -> Box<dyn SequenceGenerator> {
    Box::new(CounterSequence)
}

impl Default for NetModule {
    fn default() -> Self {
        Self::new(SocketConfig::default())
    }
}

impl NetModule {
    pub fn new(config: SocketConfig) -> Self {
        Self {
            config,
            running: true,
            next_socket: 0,
            sockets: BTreeMap::new(),
            sequence: default_sequence(),
        }
    }

    /// 替换初始序列号策略（例如测试中使用确定性策略）
    pub fn with_sequence_generator(mut self, sequence: Box<dyn SequenceGenerator>) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 关闭时拆除所有存活 socket 并清空集合
    #[tracing::instrument(skip(self, iface))]
    pub fn set_running(&mut self, iface: &mut dyn NodeNetInterface, running: bool) {
        if !running && self.running {
            info!(sockets = self.sockets.len(), "⏹️  网络模块停止，拆除所有 socket");
            let mut host = ModuleHost {
                iface,
                sequence: self.sequence.as_mut(),
            };
            for socket in self.sockets.values_mut() {
                socket.disconnect(&mut host);
            }
            self.sockets.clear();
        }
        self.running = running;
    }

    /// 创建一个未绑定端口的 socket
    pub fn create_socket(&mut self) -> SocketId {
        let id = SocketId(self.next_socket);
        self.next_socket = self.next_socket.wrapping_add(1);
        self.sockets.insert(id, Socket::new(self.config.clone()));
        debug!(socket = ?id, "创建 socket");
        id
    }

    pub fn socket(&self, id: SocketId) -> Option<&Socket> {
        self.sockets.get(&id)
    }

    pub fn sockets(&self) -> impl Iterator<Item = (SocketId, &Socket)> {
        self.sockets.iter().map(|(&id, s)| (id, s))
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    /// 端口是否被某个存活 socket 占用
    pub fn is_port_in_use(&self, port: u16) -> bool {
        self.sockets.values().any(|s| s.local_port() == Some(port))
    }

    fn socket_mut(&mut self, id: SocketId) -> Result<&mut Socket, NetModuleError> {
        self.sockets.get_mut(&id).ok_or(NetModuleError::UnknownSocket(id))
    }

    fn require_disconnected(&self, id: SocketId) -> Result<(), NetModuleError> {
        let socket = self.sockets.get(&id).ok_or(NetModuleError::UnknownSocket(id))?;
        if socket.state() != SocketState::Disconnected {
            return Err(NetModuleError::SocketBusy(id));
        }
        Ok(())
    }

    /// 绑定本地端口
    pub fn bind(&mut self, id: SocketId, port: u16) -> Result<(), NetModuleError> {
        self.require_disconnected(id)?;
        if self
            .sockets
            .iter()
            .any(|(&other, s)| other != id && s.local_port() == Some(port))
        {
            return Err(NetModuleError::PortInUse(port));
        }
        self.socket_mut(id)?.set_local_port(port);
        Ok(())
    }

    /// 最小的空闲临时端口
    pub fn free_port(&self) -> Option<u16> {
        (EPHEMERAL_PORT_START..=u16::MAX).find(|&p| !self.is_port_in_use(p))
    }

    pub fn set_destination(&mut self, id: SocketId, destination: Address) -> Result<(), NetModuleError> {
        self.require_disconnected(id)?;
        self.socket_mut(id)?.set_destination(destination);
        Ok(())
    }

    pub fn add_packet_handler(
        &mut self,
        id: SocketId,
        handler: Box<dyn PacketHandler>,
    ) -> Result<(), NetModuleError> {
        self.socket_mut(id)?.add_packet_handler(handler);
        Ok(())
    }

    /// 发起连接；未绑定端口时自动分配临时端口
    pub fn connect(&mut self, id: SocketId, iface: &mut dyn NodeNetInterface) -> Result<(), NetModuleError> {
        if self.socket_mut(id)?.local_port().is_none() {
            let port = self.free_port().ok_or(NetModuleError::PortsExhausted)?;
            self.bind(id, port)?;
        }
        self.with_socket(id, iface, |socket, host| socket.connect(host))
    }

    /// 在已连接的 socket 上发送数据；未连接时丢弃
    pub fn send_data(
        &mut self,
        id: SocketId,
        iface: &mut dyn NodeNetInterface,
        data: Value,
    ) -> Result<(), NetModuleError> {
        self.with_socket(id, iface, |socket, host| socket.send(host, data))
    }

    pub fn disconnect(&mut self, id: SocketId, iface: &mut dyn NodeNetInterface) -> Result<(), NetModuleError> {
        self.with_socket(id, iface, |socket, host| socket.disconnect(host))
    }

    /// 底层发送：直接交给网卡
    pub fn send(&mut self, iface: &mut dyn NodeNetInterface, packet: Packet) {
        if !self.running {
            debug!("网络模块未运行，丢弃数据包");
            return;
        }
        iface.process(packet);
    }

    /// 以 socket 的端口和目的地址包装数据后发送（不检查 socket 状态）
    pub fn send_tcp(
        &mut self,
        id: SocketId,
        iface: &mut dyn NodeNetInterface,
        data: Value,
    ) -> Result<(), NetModuleError> {
        let socket = self.sockets.get(&id).ok_or(NetModuleError::UnknownSocket(id))?;
        let (Some(port), Some(destination)) = (socket.local_port(), socket.destination().cloned()) else {
            debug!(socket = ?id, "socket 未绑定端口或目的地址，丢弃");
            return Ok(());
        };
        if !self.running {
            return Ok(());
        }
        let mut host = ModuleHost {
            iface,
            sequence: self.sequence.as_mut(),
        };
        send_tcp(&mut host, port, &destination, Payload::Data(data));
        Ok(())
    }

    /// 处理到达本机的数据包：交给负责该会话的 socket，找不到则丢弃。
    #[tracing::instrument(skip(self, iface, packet), fields(from = %packet.source, to = %packet.destination))]
    pub fn handle(&mut self, iface: &mut dyn NodeNetInterface, packet: Packet) {
        if !self.running {
            debug!("网络模块未运行，丢弃数据包");
            return;
        }
        if !packet.is_tcp() {
            trace!(protocol = %packet.protocol, "非 tcp 数据包，丢弃");
            return;
        }
        let Some(socket) = self.sockets.values_mut().find(|s| s.matches(&packet)) else {
            debug!("没有匹配的会话，丢弃数据包");
            return;
        };
        let mut host = ModuleHost {
            iface,
            sequence: self.sequence.as_mut(),
        };
        socket.handle(&mut host, packet.data);
        self.prune();
    }

    /// 推进所有 socket 一个 tick
    pub fn update(&mut self, iface: &mut dyn NodeNetInterface) {
        if !self.running {
            return;
        }
        let mut host = ModuleHost {
            iface,
            sequence: self.sequence.as_mut(),
        };
        for socket in self.sockets.values_mut() {
            socket.update(&mut host);
        }
        self.prune();
    }

    fn with_socket<F>(&mut self, id: SocketId, iface: &mut dyn NodeNetInterface, f: F) -> Result<(), NetModuleError>
    where
        F: FnOnce(&mut Socket, &mut dyn SocketHost),
    {
        if !self.running {
            warn!(socket = ?id, "网络模块未运行，忽略操作");
            return Ok(());
        }
        let socket = self.sockets.get_mut(&id).ok_or(NetModuleError::UnknownSocket(id))?;
        let mut host = ModuleHost {
            iface,
            sequence: self.sequence.as_mut(),
        };
        f(socket, &mut host);
        self.prune();
        Ok(())
    }

    fn prune(&mut self) {
        self.sockets.retain(|id, s| {
            if s.is_closed() {
                debug!(socket = ?id, "移除已拆除的 socket");
            }
            !s.is_closed()
        });
    }
}
