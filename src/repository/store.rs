// ==========================================
// 备考学习计划排程系统 - 排程事务存储
// ==========================================
// 职责: 为跨记录变更(队列条目 + 一个或多个周历)提供单事务的
//       读-改-写入口
// 红线: 任何触及多条持久化记录的变更必须在一个事务内完成,
//       防止两个并发调用方基于过期读数各自计算"剩余容量"而超排
// ==========================================

use crate::domain::calendar::CalendarWeek;
use crate::domain::queue::QueueEntry;
use crate::domain::types::SequenceKey;
use crate::repository::calendar_repo;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::queue_repo;
use chrono::NaiveDate;
use rusqlite::{Connection, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// ScheduleTxn - 事务上下文
// ==========================================

/// 一次排程事务的读写句柄
///
/// 仅在 `SchedulingStore::in_transaction` 的闭包内存在;
/// 所有读写落在同一个 SQLite 事务上
pub struct ScheduleTxn<'a> {
    tx: &'a Transaction<'a>,
}

impl<'a> ScheduleTxn<'a> {
    /// 读队列条目
    pub fn queue_entry(&self, key: SequenceKey) -> RepositoryResult<Option<QueueEntry>> {
        queue_repo::find_by_key_conn(self.tx, key)
    }

    /// 读队列条目, 缺失视为致命 NotFound
    pub fn require_queue_entry(&self, key: SequenceKey) -> RepositoryResult<QueueEntry> {
        self.queue_entry(key)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "QueueEntry".to_string(),
            id: key.to_string(),
        })
    }

    /// 写回队列条目
    pub fn save_queue_entry(&self, entry: &QueueEntry) -> RepositoryResult<()> {
        queue_repo::update_entry_conn(self.tx, entry)
    }

    /// 改键重写队列条目 (回队尾)
    pub fn rekey_queue_entry(
        &self,
        old_key: SequenceKey,
        entry: &QueueEntry,
    ) -> RepositoryResult<()> {
        queue_repo::rekey_entry_conn(self.tx, old_key, entry)
    }

    /// 当前最大 sequence_key
    pub fn max_sequence_key(&self) -> RepositoryResult<Option<SequenceKey>> {
        queue_repo::max_sequence_key_conn(self.tx)
    }

    /// 按状态有序列出队列条目
    pub fn queue_entries_by_states(
        &self,
        states: &[crate::domain::types::QueueState],
    ) -> RepositoryResult<Vec<QueueEntry>> {
        queue_repo::list_by_states_conn(self.tx, states)
    }

    /// 读一周 (不创建)
    pub fn week(&self, week_start: NaiveDate) -> RepositoryResult<Option<CalendarWeek>> {
        calendar_repo::find_week_conn(self.tx, CalendarWeek::week_start_of(week_start))
    }

    /// 读一周, 缺失视为致命 NotFound
    pub fn require_week(&self, week_start: NaiveDate) -> RepositoryResult<CalendarWeek> {
        self.week(week_start)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "CalendarWeek".to_string(),
            id: CalendarWeek::week_start_of(week_start).to_string(),
        })
    }

    /// 读一周, 不存在时以默认容量懒创建
    pub fn get_or_init_week(
        &self,
        week_start: NaiveDate,
        default_minutes: i64,
    ) -> RepositoryResult<CalendarWeek> {
        calendar_repo::get_or_init_week_conn(self.tx, week_start, default_minutes)
    }

    /// 写回一周
    pub fn save_week(&self, week: &CalendarWeek) -> RepositoryResult<()> {
        calendar_repo::upsert_week_conn(self.tx, week)
    }

    /// 列出全部周起始日 (升序)
    pub fn all_week_starts(&self) -> RepositoryResult<Vec<NaiveDate>> {
        let mut stmt = self
            .tx
            .prepare("SELECT week_start FROM calendar_week ORDER BY week_start")?;
        let starts = stmt
            .query_map([], |row| row.get::<_, NaiveDate>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(starts)
    }
}

// ==========================================
// SchedulingStore - 排程事务存储
// ==========================================

/// 排程事务存储
///
/// Scheduler / RebalanceEngine 的唯一持久化入口:
/// 读当前状态 → 内存中计算新值 → 原子提交全部写入
pub struct SchedulingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SchedulingStore {
    /// 从已有连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 在单个事务内执行读-改-写
    ///
    /// 闭包返回 Ok 则提交, 返回 Err 则回滚(无部分写入)
    pub fn in_transaction<T>(
        &self,
        f: impl FnOnce(&ScheduleTxn<'_>) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let result = f(&ScheduleTxn { tx: &tx });
        match result {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
                Ok(value)
            }
            Err(e) => {
                // drop(tx) 即回滚
                Err(e)
            }
        }
    }
}
