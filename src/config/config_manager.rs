// ==========================================
// 备考学习计划排程系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value)
// ==========================================

use crate::db::configure_sqlite_connection;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键全集
// ==========================================
pub mod config_keys {
    /// 无档案时的默认日容量(分钟)
    pub const DEFAULT_DAILY_MINUTES: &str = "schedule.default_daily_minutes";
    /// 队列重建批次大小
    pub const QUEUE_WRITE_BATCH_SIZE: &str = "queue.write_batch_size";
    /// 单次排程向前扫描的天数上限 (防御退化数据导致的失控循环)
    pub const MAX_FILL_DAYS: &str = "schedule.max_fill_days";
    /// 进度预测的日容量硬下限(分钟)
    pub const MIN_PROJECTION_MINUTES: &str = "progress.min_projection_minutes";
    /// 目录导入批次大小
    pub const IMPORT_BATCH_SIZE: &str = "import.batch_size";
    /// 目录导入批次最大重试次数
    pub const IMPORT_MAX_RETRIES: &str = "import.max_retries";
}

/// 内置默认值 (键缺失时生效)
fn builtin_default(key: &str) -> Option<i64> {
    match key {
        config_keys::DEFAULT_DAILY_MINUTES => Some(120),
        config_keys::QUEUE_WRITE_BATCH_SIZE => Some(50),
        config_keys::MAX_FILL_DAYS => Some(370),
        config_keys::MIN_PROJECTION_MINUTES => Some(30),
        config_keys::IMPORT_BATCH_SIZE => Some(100),
        config_keys::IMPORT_MAX_RETRIES => Some(3),
        _ => None,
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            configure_sqlite_connection(&conn_guard)?;
        }
        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let result = conn
            .query_row(
                "SELECT value FROM config_kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(result)
    }

    /// 读取整型配置, 缺失/不可解析时落内置默认
    pub fn get_i64(&self, key: &str) -> Result<i64, Box<dyn Error>> {
        if let Some(raw) = self.get_config_value(key)? {
            if let Ok(v) = raw.trim().parse::<i64>() {
                return Ok(v);
            }
            tracing::warn!(key, raw, "配置值不可解析为整数，使用内置默认");
        }
        builtin_default(key).ok_or_else(|| format!("未知配置键: {}", key).into())
    }

    /// 读取 usize 配置 (负值按默认处理)
    pub fn get_usize(&self, key: &str) -> Result<usize, Box<dyn Error>> {
        let v = self.get_i64(key)?;
        if v < 0 {
            return Ok(builtin_default(key).unwrap_or(0).max(0) as usize);
        }
        Ok(v as usize)
    }

    /// 写入配置值 (upsert)
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    /// 列出全部配置项
    pub fn list_all(&self) -> Result<Vec<(String, String)>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt = conn.prepare("SELECT key, value FROM config_kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}
