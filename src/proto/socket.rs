//! 可靠传输 socket（简化版）
//!
//! 状态机：
//! - `Disconnected`：初始状态，也是拆除后的终态。
//! - `Connecting`：握手进行中（发起方已发 syn，或响应方已回 syn-ack）。
//! - `Connected`：可以收发数据。
//!
//! 所有超时都由 socket 自己持有的 [`Scheduler`] 驱动，每个仿真 tick 调用一次
//! [`Socket::update`]。拆除时取消全部定时器，不会有过期定时器落到重建的连接上。

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::handler::PacketHandler;
use super::host::SocketHost;
use crate::net::{Address, Handshake, Keepalive, Packet, Payload};
use crate::sim::{Scheduler, TimerId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConfig {
    /// 握手超时（tick）
    pub connection_timeout: u64,
    /// 空闲多久发一次保活请求（tick）
    pub keepalive_period: u64,
    /// 等待保活响应的时间（tick）
    pub keepalive_response_timeout: u64,
}

impl SocketConfig {
    pub const CONNECTION_TIMEOUT: u64 = 20;
    pub const KEEPALIVE_PERIOD: u64 = 100;
    pub const KEEPALIVE_RESPONSE_TIMEOUT: u64 = 20;
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Self::CONNECTION_TIMEOUT,
            keepalive_period: Self::KEEPALIVE_PERIOD,
            keepalive_response_timeout: Self::KEEPALIVE_RESPONSE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum SocketTimer {
    HandshakeTimeout,
    KeepalivePeriod,
    KeepaliveResponseTimeout,
}

#[derive(Serialize, Deserialize)]
pub struct Socket {
    config: SocketConfig,
    local_port: Option<u16>,
    destination: Option<Address>,
    state: SocketState,
    /// 本端是否是握手发起方
    initiator: bool,
    current_seq: u32,
    incoming: VecDeque<Value>,
    #[serde(skip)]
    handlers: Vec<Box<dyn PacketHandler>>,
    timers: Scheduler<SocketTimer>,
    handshake_timer: Option<TimerId>,
    keepalive_timer: Option<TimerId>,
    keepalive_response_timer: Option<TimerId>,
    /// 被拆除过；`NetModule` 据此把它移出存活集合
    closed: bool,
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("local_port", &self.local_port)
            .field("destination", &self.destination)
            .field("state", &self.state)
            .field("current_seq", &self.current_seq)
            .field("incoming", &self.incoming.len())
            .field("handlers", &self.handlers.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl Default for Socket {
    fn default() -> Self {
        Self::new(SocketConfig::default())
    }
}

impl Socket {
    pub fn new(config: SocketConfig) -> Self {
        Self {
            config,
            local_port: None,
            destination: None,
            state: SocketState::Disconnected,
            initiator: false,
            current_seq: 0,
            incoming: VecDeque::new(),
            handlers: Vec::new(),
            timers: Scheduler::default(),
            handshake_timer: None,
            keepalive_timer: None,
            keepalive_response_timer: None,
            closed: false,
        }
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    pub(crate) fn set_local_port(&mut self, port: u16) {
        self.local_port = Some(port);
    }

    pub fn destination(&self) -> Option<&Address> {
        self.destination.as_ref()
    }

    pub(crate) fn set_destination(&mut self, destination: Address) {
        self.destination = Some(destination);
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn current_seq(&self) -> u32 {
        self.current_seq
    }

    /// 尚未交付给处理器的数据
    pub fn pending_data(&self) -> usize {
        self.incoming.len()
    }

    /// 挂起的内部定时器数量
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn add_packet_handler(&mut self, handler: Box<dyn PacketHandler>) {
        self.handlers.push(handler);
    }

    pub fn packet_handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// 此 socket 是否负责 `packet` 所属的会话
    pub fn matches(&self, packet: &Packet) -> bool {
        self.local_port == Some(packet.destination.port)
            && self.destination.as_ref() == Some(&packet.source)
    }

    /// 发起握手。只在 `Disconnected` 且端口、目的地址都已设置时有效。
    #[tracing::instrument(skip(self, host), fields(port = ?self.local_port))]
    pub fn connect(&mut self, host: &mut dyn SocketHost) {
        if self.state != SocketState::Disconnected {
            warn!(state = ?self.state, "connect 只能在 Disconnected 状态调用，忽略");
            return;
        }
        let (Some(port), Some(_)) = (self.local_port, self.destination.as_ref()) else {
            warn!("端口或目的地址未设置，忽略 connect");
            return;
        };

        self.closed = false;
        self.initiator = true;
        self.current_seq = host.next_sequence(port);
        info!(seq = self.current_seq, "🤝 发起握手");
        self.emit(host, Payload::Handshake(Handshake::Syn { seq: self.current_seq }));
        self.state = SocketState::Connecting;
        self.arm_handshake_timer();
    }

    /// 发送应用数据；非 `Connected` 时丢弃
    pub fn send(&mut self, host: &mut dyn SocketHost, data: Value) {
        if self.state != SocketState::Connected {
            debug!(state = ?self.state, "socket 未连接，丢弃待发送数据");
            return;
        }
        self.emit(host, Payload::Data(data));
    }

    /// 主动断开：通知对端（不等待确认）并立即进入 `Disconnected`
    #[tracing::instrument(skip(self, host), fields(port = ?self.local_port))]
    pub fn disconnect(&mut self, host: &mut dyn SocketHost) {
        if self.state == SocketState::Disconnected {
            trace!("已断开，忽略 disconnect");
            return;
        }
        self.emit(host, Payload::Teardown);
        self.teardown();
    }

    /// 处理一个属于本会话的负载
    #[tracing::instrument(skip(self, host, payload), fields(port = ?self.local_port, state = ?self.state))]
    pub fn handle(&mut self, host: &mut dyn SocketHost, payload: Payload) {
        trace!(payload = %payload, "收到负载");
        match payload {
            Payload::Teardown => {
                if self.state != SocketState::Disconnected {
                    info!("对端拆除连接");
                    self.teardown();
                }
            }
            Payload::Handshake(step) => self.on_handshake(host, step),
            Payload::Keepalive(Keepalive::Req) => {
                if self.state == SocketState::Connected {
                    self.restart_keepalive();
                    self.emit(host, Payload::Keepalive(Keepalive::Rsp));
                }
            }
            Payload::Keepalive(Keepalive::Rsp) => {
                if self.state == SocketState::Connected {
                    trace!("收到保活响应");
                    self.restart_keepalive();
                }
            }
            Payload::Data(data) => {
                if self.state != SocketState::Connected {
                    debug!("socket 未连接，丢弃数据");
                    return;
                }
                self.incoming.push_back(data);
                self.restart_keepalive();
            }
        }
    }

    fn on_handshake(&mut self, host: &mut dyn SocketHost, step: Handshake) {
        match (self.state, step) {
            (SocketState::Disconnected, Handshake::Syn { seq }) => {
                let Some(port) = self.local_port else {
                    return;
                };
                self.closed = false;
                self.initiator = false;
                self.current_seq = host.next_sequence(port);
                debug!(remote_seq = seq, seq = self.current_seq, "响应握手");
                self.emit(
                    host,
                    Payload::Handshake(Handshake::SynAck {
                        seq: self.current_seq,
                        ack: seq.wrapping_add(1),
                    }),
                );
                self.state = SocketState::Connecting;
                self.arm_handshake_timer();
            }
            (SocketState::Connecting, Handshake::SynAck { seq, ack })
                if self.initiator && ack == self.current_seq.wrapping_add(1) =>
            {
                self.emit(host, Payload::Handshake(Handshake::Ack { ack: seq.wrapping_add(1) }));
                self.established();
            }
            (SocketState::Connecting, Handshake::Ack { ack })
                if !self.initiator && ack == self.current_seq.wrapping_add(1) =>
            {
                self.established();
            }
            (state, step) => {
                debug!(state = ?state, step = ?step, "握手消息与当前状态不符，忽略");
            }
        }
    }

    fn established(&mut self) {
        if let Some(t) = self.handshake_timer.take() {
            self.timers.cancel(t);
        }
        self.state = SocketState::Connected;
        info!("✅ 连接建立");
        self.restart_keepalive();
    }

    /// 推进一个 tick：先按 FIFO 交付排队数据，再处理到期的定时器。
    pub fn update(&mut self, host: &mut dyn SocketHost) {
        self.timers.advance();
        self.drain_incoming(host);
        while let Some(timer) = self.timers.pop_due() {
            self.on_timer(host, timer);
        }
    }

    fn drain_incoming(&mut self, host: &mut dyn SocketHost) {
        if self.state != SocketState::Connected || self.incoming.is_empty() {
            return;
        }
        // 处理器需要 &mut self，先把它们取出来
        let mut handlers = std::mem::take(&mut self.handlers);
        let batch = self.incoming.len();
        'drain: for _ in 0..batch {
            let Some(data) = self.incoming.pop_front() else {
                break;
            };
            for handler in handlers.iter_mut() {
                handler.handle(self, host, &data);
                if self.state != SocketState::Connected {
                    debug!(left = self.incoming.len(), "socket 在交付过程中断开，停止交付");
                    break 'drain;
                }
            }
        }
        // 回调期间新注册的处理器排在原有处理器之后
        handlers.append(&mut self.handlers);
        self.handlers = handlers;
    }

    fn on_timer(&mut self, host: &mut dyn SocketHost, timer: SocketTimer) {
        match timer {
            SocketTimer::HandshakeTimeout => {
                self.handshake_timer = None;
                if self.state == SocketState::Connecting {
                    warn!("⏰ 握手超时");
                    self.emit(host, Payload::Teardown);
                    self.teardown();
                }
            }
            SocketTimer::KeepalivePeriod => {
                self.keepalive_timer = None;
                if self.state == SocketState::Connected {
                    trace!("发送保活请求");
                    self.emit(host, Payload::Keepalive(Keepalive::Req));
                    self.keepalive_response_timer = Some(
                        self.timers
                            .schedule_in(self.config.keepalive_response_timeout, SocketTimer::KeepaliveResponseTimeout),
                    );
                }
            }
            SocketTimer::KeepaliveResponseTimeout => {
                self.keepalive_response_timer = None;
                if self.state == SocketState::Connected {
                    warn!("⏰ 保活无响应，对端不可达");
                    self.emit(host, Payload::Teardown);
                    self.teardown();
                }
            }
        }
    }

    fn arm_handshake_timer(&mut self) {
        if let Some(t) = self.handshake_timer.take() {
            self.timers.cancel(t);
        }
        self.handshake_timer = Some(
            self.timers
                .schedule_in(self.config.connection_timeout, SocketTimer::HandshakeTimeout),
        );
    }

    /// 收到对端的任何流量都说明对端存活：重新开始一个完整的保活周期
    fn restart_keepalive(&mut self) {
        for t in [self.keepalive_timer.take(), self.keepalive_response_timer.take()]
            .into_iter()
            .flatten()
        {
            self.timers.cancel(t);
        }
        self.keepalive_timer = Some(
            self.timers
                .schedule_in(self.config.keepalive_period, SocketTimer::KeepalivePeriod),
        );
    }

    fn teardown(&mut self) {
        self.state = SocketState::Disconnected;
        self.timers.cancel_all();
        self.handshake_timer = None;
        self.keepalive_timer = None;
        self.keepalive_response_timer = None;
        self.incoming.clear();
        self.closed = true;
        info!("🔌 socket 断开");
    }

    fn emit(&self, host: &mut dyn SocketHost, payload: Payload) {
        let (Some(port), Some(destination)) = (self.local_port, self.destination.as_ref()) else {
            debug!("socket 未绑定端口或目的地址，丢弃");
            return;
        };
        super::net_module::send_tcp(host, port, destination, payload);
    }
}
