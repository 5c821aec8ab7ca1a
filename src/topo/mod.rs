//! 常用拓扑构建器

pub mod two_tier;
