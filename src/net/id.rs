//! 标识符类型
//!
//! `NodeKey`/`NetworkId` 是拓扑 arena 中的全局句柄；`NetId` 是设备的分层地址。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 节点在拓扑 arena 中的句柄（全局唯一，不会复用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey(pub usize);

/// 网络在拓扑 arena 中的句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetworkId(pub usize);

/// 分层网络地址：从最外层网络到设备所在层，每层一个分量。
///
/// 相等与排序都是逐分量的结构比较。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetId(Vec<u32>);

impl NetId {
    pub fn new(components: impl Into<Vec<u32>>) -> Self {
        Self(components.into())
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// 层数
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &[u32]) -> bool {
        self.0.starts_with(prefix)
    }
}

impl From<Vec<u32>> for NetId {
    fn from(components: Vec<u32>) -> Self {
        Self(components)
    }
}

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}
