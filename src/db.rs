// ==========================================
// 备考学习计划排程系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供幂等建表入口（本项目无独立迁移目录）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等初始化全部表结构
///
/// 调用时机: AppState 启动 / 测试库初始化
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS curriculum_chapter (
            chapter_id TEXT PRIMARY KEY,
            section TEXT NOT NULL,
            chapter_name TEXT NOT NULL,
            category TEXT,
            chapter_rank INTEGER
        );

        CREATE TABLE IF NOT EXISTS curriculum_topic (
            topic_id TEXT PRIMARY KEY,
            chapter_id TEXT NOT NULL REFERENCES curriculum_chapter(chapter_id) ON DELETE CASCADE,
            topic_name TEXT NOT NULL,
            category TEXT,
            topic_order INTEGER,
            est_minutes INTEGER
        );

        CREATE TABLE IF NOT EXISTS curriculum_subtopic (
            subtopic_id TEXT PRIMARY KEY,
            topic_id TEXT NOT NULL REFERENCES curriculum_topic(topic_id) ON DELETE CASCADE,
            subtopic_name TEXT NOT NULL,
            subtopic_order INTEGER,
            minutes INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS queue_entry (
            sequence_key INTEGER PRIMARY KEY,
            section TEXT NOT NULL,
            chapter_id TEXT NOT NULL,
            chapter_name TEXT NOT NULL,
            topic_id TEXT NOT NULL UNIQUE,
            topic_name TEXT NOT NULL,
            queue_state TEXT NOT NULL DEFAULT 'QUEUED',
            subtopics_json TEXT NOT NULL,
            scheduled_dates_json TEXT NOT NULL DEFAULT '{}',
            scheduled_minutes INTEGER NOT NULL DEFAULT 0,
            completed_indices_json TEXT NOT NULL DEFAULT '[]',
            completed_minutes INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS queue_meta (
            meta_id TEXT PRIMARY KEY,
            build_id TEXT NOT NULL,
            total_topics INTEGER NOT NULL,
            total_minutes INTEGER NOT NULL,
            section_totals_json TEXT NOT NULL DEFAULT '{}',
            built_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS calendar_week (
            week_start TEXT PRIMARY KEY,
            day_capacity_json TEXT NOT NULL DEFAULT '{}',
            off_days_json TEXT NOT NULL DEFAULT '{}',
            assigned_slices_json TEXT NOT NULL DEFAULT '{}',
            day_completed_json TEXT NOT NULL DEFAULT '{}',
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS plan_profile (
            profile_id TEXT PRIMARY KEY,
            start_date TEXT NOT NULL,
            target_exam_date TEXT,
            daily_minutes_default INTEGER NOT NULL,
            current_day TEXT NOT NULL,
            section_order_json TEXT NOT NULL DEFAULT '[]',
            disabled_sections_json TEXT NOT NULL DEFAULT '[]',
            restrict_high_priority INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS import_batch (
            batch_id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            total_rows INTEGER NOT NULL DEFAULT 0,
            imported_rows INTEGER NOT NULL DEFAULT 0,
            skipped_rows INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'DONE',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_queue_entry_state ON queue_entry(queue_state);
        CREATE INDEX IF NOT EXISTS idx_curriculum_topic_chapter ON curriculum_topic(chapter_id);
        CREATE INDEX IF NOT EXISTS idx_curriculum_subtopic_topic ON curriculum_subtopic(topic_id);

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(1));
    }
}
