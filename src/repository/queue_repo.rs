// ==========================================
// 备考学习计划排程系统 - 主队列数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明:
// - queue_entry 以 sequence_key 为整型主键, 有序范围查询即主队列遍历
// - 嵌套结构(子主题/日期映射)以 JSON 列持久化
// - 重建用的批量删除/写入按有界批次分事务提交 (非端到端原子, 建档期操作)
// ==========================================

use crate::domain::queue::QueueEntry;
use crate::domain::types::{QueueState, SequenceKey};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 重建批量写入的默认批次大小
pub const QUEUE_WRITE_BATCH_SIZE: usize = 50;

// ==========================================
// 行映射 (供仓储与事务上下文共用)
// ==========================================

const ENTRY_COLUMNS: &str = "sequence_key, section, chapter_id, chapter_name, topic_id, \
     topic_name, queue_state, subtopics_json, scheduled_dates_json, scheduled_minutes, \
     completed_indices_json, completed_minutes, updated_at";

pub(crate) fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<(QueueEntry, String, String, String)> {
    let state_str: String = row.get(6)?;
    let subtopics_json: String = row.get(7)?;
    let dates_json: String = row.get(8)?;
    let completed_json: String = row.get(10)?;
    let updated_at: NaiveDateTime = row.get(12)?;
    let entry = QueueEntry {
        sequence_key: SequenceKey(row.get(0)?),
        section: row.get(1)?,
        chapter_id: row.get(2)?,
        chapter_name: row.get(3)?,
        topic_id: row.get(4)?,
        topic_name: row.get(5)?,
        queue_state: QueueState::parse(&state_str).unwrap_or(QueueState::Queued),
        subtopics: Vec::new(),
        scheduled_dates: BTreeMap::new(),
        scheduled_minutes: row.get(9)?,
        completed_indices: Vec::new(),
        completed_minutes: row.get(11)?,
        updated_at,
    };
    Ok((entry, subtopics_json, dates_json, completed_json))
}

fn hydrate(raw: (QueueEntry, String, String, String)) -> RepositoryResult<QueueEntry> {
    let (mut entry, subtopics_json, dates_json, completed_json) = raw;
    entry.subtopics = serde_json::from_str(&subtopics_json)?;
    entry.scheduled_dates = serde_json::from_str(&dates_json)?;
    entry.completed_indices = serde_json::from_str(&completed_json)?;
    Ok(entry)
}

/// 按键读取 (连接级, 事务内可复用)
pub(crate) fn find_by_key_conn(
    conn: &Connection,
    key: SequenceKey,
) -> RepositoryResult<Option<QueueEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM queue_entry WHERE sequence_key = ?1"
    ))?;
    let raw = stmt.query_row(params![key.0], row_to_entry).optional()?;
    raw.map(hydrate).transpose()
}

/// 写回单条 (连接级, 事务内可复用); 主键不存在时报 NotFound
pub(crate) fn update_entry_conn(conn: &Connection, entry: &QueueEntry) -> RepositoryResult<()> {
    let n = conn.execute(
        "UPDATE queue_entry SET
             section = ?2, chapter_id = ?3, chapter_name = ?4, topic_id = ?5,
             topic_name = ?6, queue_state = ?7, subtopics_json = ?8,
             scheduled_dates_json = ?9, scheduled_minutes = ?10,
             completed_indices_json = ?11, completed_minutes = ?12,
             updated_at = datetime('now')
         WHERE sequence_key = ?1",
        params![
            entry.sequence_key.0,
            entry.section,
            entry.chapter_id,
            entry.chapter_name,
            entry.topic_id,
            entry.topic_name,
            entry.queue_state.as_str(),
            serde_json::to_string(&entry.subtopics)?,
            serde_json::to_string(&entry.scheduled_dates)?,
            entry.scheduled_minutes,
            serde_json::to_string(&entry.completed_indices)?,
            entry.completed_minutes,
        ],
    )?;
    if n == 0 {
        return Err(RepositoryError::NotFound {
            entity: "QueueEntry".to_string(),
            id: entry.sequence_key.to_string(),
        });
    }
    Ok(())
}

/// 插入单条 (连接级)
pub(crate) fn insert_entry_conn(conn: &Connection, entry: &QueueEntry) -> RepositoryResult<()> {
    conn.execute(
        "INSERT INTO queue_entry (sequence_key, section, chapter_id, chapter_name, topic_id,
             topic_name, queue_state, subtopics_json, scheduled_dates_json, scheduled_minutes,
             completed_indices_json, completed_minutes, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, datetime('now'))",
        params![
            entry.sequence_key.0,
            entry.section,
            entry.chapter_id,
            entry.chapter_name,
            entry.topic_id,
            entry.topic_name,
            entry.queue_state.as_str(),
            serde_json::to_string(&entry.subtopics)?,
            serde_json::to_string(&entry.scheduled_dates)?,
            entry.scheduled_minutes,
            serde_json::to_string(&entry.completed_indices)?,
            entry.completed_minutes,
        ],
    )?;
    Ok(())
}

/// 改键 (回队尾时使用): 以删+插实现主键迁移 (事务内调用)
pub(crate) fn rekey_entry_conn(
    conn: &Connection,
    old_key: SequenceKey,
    entry: &QueueEntry,
) -> RepositoryResult<()> {
    let n = conn.execute(
        "DELETE FROM queue_entry WHERE sequence_key = ?1",
        params![old_key.0],
    )?;
    if n == 0 {
        return Err(RepositoryError::NotFound {
            entity: "QueueEntry".to_string(),
            id: old_key.to_string(),
        });
    }
    insert_entry_conn(conn, entry)
}

/// 当前最大 sequence_key (连接级)
pub(crate) fn max_sequence_key_conn(conn: &Connection) -> RepositoryResult<Option<SequenceKey>> {
    let v: Option<i64> =
        conn.query_row("SELECT MAX(sequence_key) FROM queue_entry", [], |row| row.get(0))?;
    Ok(v.map(SequenceKey))
}

/// 按状态列出 (升序, 连接级)
pub(crate) fn list_by_states_conn(
    conn: &Connection,
    states: &[QueueState],
) -> RepositoryResult<Vec<QueueEntry>> {
    let placeholders: Vec<String> = (1..=states.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM queue_entry WHERE queue_state IN ({}) ORDER BY sequence_key",
        placeholders.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let state_params: Vec<String> = states.iter().map(|s| s.as_str().to_string()).collect();
    let rows = stmt.query_map(rusqlite::params_from_iter(state_params.iter()), row_to_entry)?;
    let mut entries = Vec::new();
    for r in rows {
        entries.push(hydrate(r?)?);
    }
    Ok(entries)
}

// ==========================================
// QueueMetaRecord - 队列构建摘要
// ==========================================
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QueueMetaRecord {
    pub build_id: String,
    pub total_topics: i64,
    pub total_minutes: i64,
    /// 科目 → (主题数, 分钟数)
    pub section_totals: BTreeMap<String, (i64, i64)>,
    pub built_at: NaiveDateTime,
}

// ==========================================
// MasterQueueRepository - 主队列仓储
// ==========================================

/// 主队列仓储
/// 职责: queue_entry / queue_meta 两表的 CRUD 与批量重建
pub struct MasterQueueRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MasterQueueRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按序列键查询单条
    pub fn find_by_key(&self, key: SequenceKey) -> RepositoryResult<Option<QueueEntry>> {
        let conn = self.get_conn()?;
        find_by_key_conn(&conn, key)
    }

    /// 按主题ID查询单条
    pub fn find_by_topic_id(&self, topic_id: &str) -> RepositoryResult<Option<QueueEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM queue_entry WHERE topic_id = ?1"
        ))?;
        let raw = stmt.query_row(params![topic_id], row_to_entry).optional()?;
        raw.map(hydrate).transpose()
    }

    /// 有序列出全部条目 (主队列遍历顺序)
    pub fn list_all_ordered(&self) -> RepositoryResult<Vec<QueueEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM queue_entry ORDER BY sequence_key"
        ))?;
        let rows = stmt.query_map([], row_to_entry)?;
        let mut entries = Vec::new();
        for r in rows {
            entries.push(hydrate(r?)?);
        }
        Ok(entries)
    }

    /// 按状态列出 (升序)
    pub fn list_by_states(&self, states: &[QueueState]) -> RepositoryResult<Vec<QueueEntry>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn()?;
        list_by_states_conn(&conn, states)
    }

    /// 条目总数
    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM queue_entry", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// 当前最大 sequence_key
    pub fn max_sequence_key(&self) -> RepositoryResult<Option<SequenceKey>> {
        let conn = self.get_conn()?;
        max_sequence_key_conn(&conn)
    }

    /// 写回单条 (单事务)
    pub fn update_entry(&self, entry: &QueueEntry) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        update_entry_conn(&tx, entry)?;
        tx.commit()?;
        Ok(())
    }

    /// 按有界批次清空队列, 返回删除条数
    ///
    /// 每批独立事务; 重建期操作, 不保证端到端原子
    pub fn delete_all_batched(&self, batch_size: usize) -> RepositoryResult<usize> {
        let batch_size = batch_size.max(1);
        let mut total = 0usize;
        loop {
            let conn = self.get_conn()?;
            let n = conn.execute(
                "DELETE FROM queue_entry WHERE sequence_key IN
                     (SELECT sequence_key FROM queue_entry ORDER BY sequence_key LIMIT ?1)",
                params![batch_size as i64],
            )?;
            drop(conn);
            total += n;
            if n < batch_size {
                break;
            }
        }
        Ok(total)
    }

    /// 按有界批次写入新队列
    ///
    /// 每批一个事务
    pub fn insert_batched(&self, entries: &[QueueEntry], batch_size: usize) -> RepositoryResult<()> {
        let batch_size = batch_size.max(1);
        for chunk in entries.chunks(batch_size) {
            let mut conn = self.get_conn()?;
            let tx = conn.transaction()?;
            for entry in chunk {
                insert_entry_conn(&tx, entry)?;
            }
            tx.commit()?;
        }
        Ok(())
    }

    /// 写入构建摘要 (meta_id 固定为 'master')
    pub fn save_meta(&self, meta: &QueueMetaRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO queue_meta (meta_id, build_id, total_topics, total_minutes, section_totals_json, built_at)
             VALUES ('master', ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(meta_id) DO UPDATE SET
                 build_id = excluded.build_id,
                 total_topics = excluded.total_topics,
                 total_minutes = excluded.total_minutes,
                 section_totals_json = excluded.section_totals_json,
                 built_at = excluded.built_at",
            params![
                meta.build_id,
                meta.total_topics,
                meta.total_minutes,
                serde_json::to_string(&meta.section_totals)?,
                meta.built_at,
            ],
        )?;
        Ok(())
    }

    /// 读取构建摘要
    pub fn read_meta(&self) -> RepositoryResult<Option<QueueMetaRecord>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                "SELECT build_id, total_topics, total_minutes, section_totals_json, built_at
                 FROM queue_meta WHERE meta_id = 'master'",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, NaiveDateTime>(4)?,
                    ))
                },
            )
            .optional()?;
        match raw {
            Some((build_id, total_topics, total_minutes, totals_json, built_at)) => {
                Ok(Some(QueueMetaRecord {
                    build_id,
                    total_topics,
                    total_minutes,
                    section_totals: serde_json::from_str(&totals_json)?,
                    built_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// 删除构建摘要 (全量重置)
    pub fn delete_meta(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM queue_meta WHERE meta_id = 'master'", [])?;
        Ok(())
    }
}
