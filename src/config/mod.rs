// ==========================================
// 备考学习计划排程系统 - 配置层
// ==========================================
// 职责: 系统配置的读写与默认值管理
// ==========================================

pub mod config_manager;

pub use config_manager::{config_keys, ConfigManager};
