//! 基础设施层

pub mod observability;
pub mod persistence;
pub mod registry;
