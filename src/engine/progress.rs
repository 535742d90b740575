// ==========================================
// 备考学习计划排程系统 - 进度统计引擎
// ==========================================
// 职责: 对主队列与周历做只读投影, 产出总览统计与完成日预测
// 红线: 本引擎不写任何持久化状态
// ==========================================

use crate::config::{config_keys, ConfigManager};
use crate::domain::calendar::CalendarWeek;
use crate::domain::progress::{OverviewStats, QueueEntrySummary};
use crate::domain::queue::QueueEntry;
use crate::domain::types::QueueState;
use crate::repository::calendar_repo::CalendarWeekRepository;
use crate::repository::error::RepositoryResult;
use crate::repository::profile_repo::PlanProfileRepository;
use crate::repository::queue_repo::MasterQueueRepository;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::instrument;

pub struct ProgressAggregator {
    queue_repo: Arc<MasterQueueRepository>,
    calendar_repo: Arc<CalendarWeekRepository>,
    profile_repo: Arc<PlanProfileRepository>,
    config: Arc<ConfigManager>,
}

impl ProgressAggregator {
    pub fn new(
        queue_repo: Arc<MasterQueueRepository>,
        calendar_repo: Arc<CalendarWeekRepository>,
        profile_repo: Arc<PlanProfileRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            queue_repo,
            calendar_repo,
            profile_repo,
            config,
        }
    }

    /// 总览统计
    ///
    /// 口径: REMOVED 条目完全不计; 总分钟为 0 时 overall_progress 为 None
    #[instrument(skip(self))]
    pub fn compute_overview(&self) -> RepositoryResult<OverviewStats> {
        let entries: Vec<QueueEntry> = self
            .queue_repo
            .list_all_ordered()?
            .into_iter()
            .filter(|e| e.queue_state != QueueState::Removed)
            .collect();

        let minutes_total: i64 = entries.iter().map(|e| e.total_minutes()).sum();
        let minutes_studied: i64 = entries.iter().map(|e| e.completed_minutes).sum();
        let minutes_scheduled: i64 = entries.iter().map(|e| e.scheduled_minutes).sum();
        let topics_total = entries.len();
        let topics_completed = entries
            .iter()
            .filter(|e| e.queue_state == QueueState::Done)
            .count();

        let overall_progress = if minutes_total > 0 {
            Some(minutes_studied as f64 / minutes_total as f64)
        } else {
            None
        };

        let remaining = (minutes_total - minutes_studied).max(0);
        let projected_end_date = if topics_total == 0 || remaining == 0 {
            None
        } else {
            Some(self.project_end_date(remaining)?)
        };

        Ok(OverviewStats {
            overall_progress,
            minutes_studied,
            minutes_scheduled,
            minutes_total,
            topics_completed,
            topics_total,
            projected_end_date,
        })
    }

    /// 剩余分钟 → 预计完成日
    ///
    /// 日消化速率取当前周非零有效容量的均值; 当前周不存在时退回
    /// 档案默认日容量; 最终不低于保底速率, 防止极小容量把预测推到天边
    fn project_end_date(&self, remaining_minutes: i64) -> RepositoryResult<NaiveDate> {
        let profile = self.profile_repo.find()?;
        let current_day = profile
            .as_ref()
            .map(|p| p.current_day)
            .unwrap_or_else(|| chrono::Utc::now().date_naive());

        let week_rate = self
            .calendar_repo
            .find_week(CalendarWeek::week_start_of(current_day))?
            .and_then(|week| {
                let caps: Vec<i64> = week
                    .days()
                    .into_iter()
                    .map(|d| week.effective_capacity(d))
                    .filter(|c| *c > 0)
                    .collect();
                if caps.is_empty() {
                    None
                } else {
                    Some(caps.iter().sum::<i64>() / caps.len() as i64)
                }
            });

        let fallback = profile
            .as_ref()
            .map(|p| p.daily_minutes_default)
            .unwrap_or_else(|| {
                self.config
                    .get_i64(config_keys::DEFAULT_DAILY_MINUTES)
                    .unwrap_or(120)
            });
        let floor = self
            .config
            .get_i64(config_keys::MIN_PROJECTION_MINUTES)
            .unwrap_or(30);
        let rate = week_rate.unwrap_or(fallback).max(floor).max(1);

        // 向上取整的天数, 从今天起算
        let days_needed = (remaining_minutes + rate - 1) / rate;
        Ok(current_day + Duration::days(days_needed.max(1) - 1))
    }

    /// 队列摘要列表 (升序, 不展开子主题)
    pub fn summarize_queue(&self) -> RepositoryResult<Vec<QueueEntrySummary>> {
        let entries = self.queue_repo.list_all_ordered()?;
        Ok(entries
            .iter()
            .filter(|e| e.queue_state != QueueState::Removed)
            .map(|e| QueueEntrySummary {
                sequence_key: e.sequence_key.0,
                section: e.section.clone(),
                chapter_name: e.chapter_name.clone(),
                topic_id: e.topic_id.clone(),
                topic_name: e.topic_name.clone(),
                queue_state: e.queue_state.as_str().to_string(),
                total_minutes: e.total_minutes(),
                scheduled_minutes: e.scheduled_minutes,
                completed_minutes: e.completed_minutes,
                subtopic_count: e.subtopics.len(),
            })
            .collect())
    }
}
