//! 基础设施层
//!
//! Postgres 连接池和 Repository 实现。

pub mod db;
