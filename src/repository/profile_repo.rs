// ==========================================
// 备考学习计划排程系统 - 计划档案数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 单学习者模型, profile_id 固定为 'default'
// ==========================================

use crate::domain::profile::PlanProfile;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

const PROFILE_ID: &str = "default";

/// 计划档案仓储
pub struct PlanProfileRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PlanProfileRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取档案
    pub fn find(&self) -> RepositoryResult<Option<PlanProfile>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                "SELECT start_date, target_exam_date, daily_minutes_default, current_day,
                        section_order_json, disabled_sections_json, restrict_high_priority
                 FROM plan_profile WHERE profile_id = ?1",
                params![PROFILE_ID],
                |row| {
                    Ok((
                        row.get::<_, NaiveDate>(0)?,
                        row.get::<_, Option<NaiveDate>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, NaiveDate>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, bool>(6)?,
                    ))
                },
            )
            .optional()?;

        match raw {
            Some((start, exam, daily, current, order_json, disabled_json, restrict)) => {
                Ok(Some(PlanProfile {
                    start_date: start,
                    target_exam_date: exam,
                    daily_minutes_default: daily,
                    current_day: current,
                    section_order: serde_json::from_str(&order_json)?,
                    disabled_sections: serde_json::from_str(&disabled_json)?,
                    restrict_high_priority_only: restrict,
                }))
            }
            None => Ok(None),
        }
    }

    /// 读取档案, 缺失时报 NotFound
    pub fn require(&self) -> RepositoryResult<PlanProfile> {
        self.find()?.ok_or_else(|| RepositoryError::NotFound {
            entity: "PlanProfile".to_string(),
            id: PROFILE_ID.to_string(),
        })
    }

    /// 写入档案 (upsert)
    pub fn save(&self, profile: &PlanProfile) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO plan_profile (profile_id, start_date, target_exam_date,
                 daily_minutes_default, current_day, section_order_json,
                 disabled_sections_json, restrict_high_priority, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
             ON CONFLICT(profile_id) DO UPDATE SET
                 start_date = excluded.start_date,
                 target_exam_date = excluded.target_exam_date,
                 daily_minutes_default = excluded.daily_minutes_default,
                 current_day = excluded.current_day,
                 section_order_json = excluded.section_order_json,
                 disabled_sections_json = excluded.disabled_sections_json,
                 restrict_high_priority = excluded.restrict_high_priority,
                 updated_at = excluded.updated_at",
            params![
                PROFILE_ID,
                profile.start_date,
                profile.target_exam_date,
                profile.daily_minutes_default,
                profile.current_day,
                serde_json::to_string(&profile.section_order)?,
                serde_json::to_string(&profile.disabled_sections)?,
                profile.restrict_high_priority_only,
            ],
        )?;
        Ok(())
    }

    /// 删除档案 (全量重置)
    pub fn delete(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM plan_profile WHERE profile_id = ?1", params![PROFILE_ID])?;
        Ok(())
    }
}
