// ==========================================
// 备考学习计划排程系统 - 周历数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 周历为按周一日期键控的文档, 首次访问懒创建
// ==========================================

use crate::domain::calendar::CalendarWeek;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// 行映射 (供仓储与事务上下文共用)
// ==========================================

pub(crate) fn find_week_conn(
    conn: &Connection,
    week_start: NaiveDate,
) -> RepositoryResult<Option<CalendarWeek>> {
    let raw = conn
        .query_row(
            "SELECT week_start, day_capacity_json, off_days_json, assigned_slices_json,
                    day_completed_json, updated_at
             FROM calendar_week WHERE week_start = ?1",
            params![week_start],
            |row| {
                Ok((
                    row.get::<_, NaiveDate>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, NaiveDateTime>(5)?,
                ))
            },
        )
        .optional()?;

    match raw {
        Some((week_start, cap_json, off_json, slices_json, done_json, updated_at)) => {
            Ok(Some(CalendarWeek {
                week_start,
                day_capacity_minutes: serde_json::from_str(&cap_json)?,
                off_days: serde_json::from_str(&off_json)?,
                assigned_slices: serde_json::from_str(&slices_json)?,
                day_completed: serde_json::from_str(&done_json)?,
                updated_at,
            }))
        }
        None => Ok(None),
    }
}

pub(crate) fn upsert_week_conn(conn: &Connection, week: &CalendarWeek) -> RepositoryResult<()> {
    conn.execute(
        "INSERT INTO calendar_week (week_start, day_capacity_json, off_days_json,
             assigned_slices_json, day_completed_json, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
         ON CONFLICT(week_start) DO UPDATE SET
             day_capacity_json = excluded.day_capacity_json,
             off_days_json = excluded.off_days_json,
             assigned_slices_json = excluded.assigned_slices_json,
             day_completed_json = excluded.day_completed_json,
             updated_at = excluded.updated_at",
        params![
            week.week_start,
            serde_json::to_string(&week.day_capacity_minutes)?,
            serde_json::to_string(&week.off_days)?,
            serde_json::to_string(&week.assigned_slices)?,
            serde_json::to_string(&week.day_completed)?,
        ],
    )?;
    Ok(())
}

/// 懒创建读取 (事务内可复用): 不存在时以默认容量初始化并落库
pub(crate) fn get_or_init_week_conn(
    conn: &Connection,
    week_start: NaiveDate,
    default_minutes: i64,
) -> RepositoryResult<CalendarWeek> {
    let week_start = CalendarWeek::week_start_of(week_start);
    if let Some(week) = find_week_conn(conn, week_start)? {
        return Ok(week);
    }
    let week = CalendarWeek::with_default_capacity(week_start, default_minutes);
    upsert_week_conn(conn, &week)?;
    tracing::debug!(week_start = %week_start, default_minutes, "懒创建周历");
    Ok(week)
}

// ==========================================
// CalendarWeekRepository - 周历仓储
// ==========================================

/// 周历仓储
/// 职责: 管理 calendar_week 表的读写与懒创建
pub struct CalendarWeekRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CalendarWeekRepository {
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

    /// 按周一日期查询一周 (输入自动归一化到周一)
    pub fn find_week(&self, week_start: NaiveDate) -> RepositoryResult<Option<CalendarWeek>> {
        let conn = self.get_conn()?;
        find_week_conn(&conn, CalendarWeek::week_start_of(week_start))
    }

    /// 读取一周, 不存在时以默认容量懒创建
    pub fn get_or_init_week(
        &self,
        week_start: NaiveDate,
        default_minutes: i64,
    ) -> RepositoryResult<CalendarWeek> {
        let conn = self.get_conn()?;
        get_or_init_week_conn(&conn, week_start, default_minutes)
    }

    /// 写回一周
    pub fn save_week(&self, week: &CalendarWeek) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        upsert_week_conn(&conn, week)
    }

    /// 列出全部周 (升序)
    pub fn list_all_weeks(&self) -> RepositoryResult<Vec<CalendarWeek>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT week_start FROM calendar_week ORDER BY week_start",
        )?;
        let starts: Vec<NaiveDate> = stmt
            .query_map([], |row| row.get::<_, NaiveDate>(0))?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        let mut weeks = Vec::new();
        for start in starts {
            if let Some(week) = find_week_conn(&conn, start)? {
                weeks.push(week);
            }
        }
        Ok(weeks)
    }

    /// 清空全部周 (全量重置)
    pub fn delete_all(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n = conn.execute("DELETE FROM calendar_week", [])?;
        Ok(n)
    }
}
