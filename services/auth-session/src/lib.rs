//! Auth Session Service Library
//!
//! 会话核心：
//! - `domain`: 会话实体、令牌算法、过期策略、仓储 trait
//! - `application`: 会话提供者（创建、解析、访问、撤销、列表）
//! - `infrastructure`: Redis / PostgreSQL / 内存实现
//! - `api`: HTTP 会话解析器与中间件

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
