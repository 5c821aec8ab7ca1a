//! 数据包类型
//!
//! `Packet` 在发出后即不再修改。协议内部的控制消息（握手、保活、拆除）
//! 与应用数据共用 `Payload`，由类型区分而不是由字符串前缀区分。

use super::id::NetId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 可靠传输层使用的协议标签
pub const TCP_PROTOCOL: &str = "tcp";

/// socket 端点：地址 + 端口
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    pub net_id: NetId,
    pub port: u16,
}

impl Address {
    pub fn new(net_id: NetId, port: u16) -> Self {
        Self { net_id, port }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.net_id, self.port)
    }
}

/// 三次握手消息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum Handshake {
    Syn { seq: u32 },
    SynAck { seq: u32, ack: u32 },
    Ack { ack: u32 },
}

/// 保活消息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keepalive {
    Req,
    Rsp,
}

/// 数据包负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Handshake(Handshake),
    Keepalive(Keepalive),
    Teardown,
    /// 应用数据，任意可序列化的值
    Data(Value),
}

impl Payload {
    pub fn is_control(&self) -> bool {
        !matches!(self, Payload::Data(_))
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Handshake(Handshake::Syn { seq }) => write!(f, "$_handshake syn {seq}"),
            Payload::Handshake(Handshake::SynAck { seq, ack }) => {
                write!(f, "$_handshake syn-ack {seq} {ack}")
            }
            Payload::Handshake(Handshake::Ack { ack }) => write!(f, "$_handshake ack {ack}"),
            Payload::Keepalive(Keepalive::Req) => f.write_str("$_keepalive req"),
            Payload::Keepalive(Keepalive::Rsp) => f.write_str("$_keepalive rsp"),
            Payload::Teardown => f.write_str("$_teardown"),
            Payload::Data(v) => write!(f, "{v}"),
        }
    }
}

/// 网络数据包
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub source: Address,
    pub destination: Address,
    pub protocol: String,
    pub data: Payload,
}

impl Packet {
    pub fn new(source: Address, destination: Address, protocol: impl Into<String>, data: Payload) -> Self {
        Self {
            source,
            destination,
            protocol: protocol.into(),
            data,
        }
    }

    pub fn tcp(source: Address, destination: Address, data: Payload) -> Self {
        Self::new(source, destination, TCP_PROTOCOL, data)
    }

    pub fn is_tcp(&self) -> bool {
        self.protocol == TCP_PROTOCOL
    }
}
