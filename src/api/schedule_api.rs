// ==========================================
// 备考学习计划排程系统 - 排程操作 API
// ==========================================
// 职责: 排程/再平衡/周历维护的外部操作面
// 红线 1: 已结算日拒绝容量与休息日变更
// 红线 2: 仍有切片的日拒绝标记为休息日
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::{config_keys, ConfigManager};
use crate::domain::calendar::CalendarWeek;
use crate::domain::types::{ScheduleOutcome, SequenceKey};
use crate::engine::rebalance::{
    FinalizeResult, MoveForwardResult, RebalanceEngine, RequeueResult, UnscheduleResult,
};
use crate::engine::scheduler::{PackResult, Scheduler};
use crate::repository::calendar_repo::CalendarWeekRepository;
use crate::repository::profile_repo::PlanProfileRepository;
use chrono::NaiveDate;
use std::sync::Arc;

pub struct ScheduleApi {
    scheduler: Arc<Scheduler>,
    rebalance: Arc<RebalanceEngine>,
    calendar_repo: Arc<CalendarWeekRepository>,
    profile_repo: Arc<PlanProfileRepository>,
    config: Arc<ConfigManager>,
}

impl ScheduleApi {
    pub fn new(
        scheduler: Arc<Scheduler>,
        rebalance: Arc<RebalanceEngine>,
        calendar_repo: Arc<CalendarWeekRepository>,
        profile_repo: Arc<PlanProfileRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            scheduler,
            rebalance,
            calendar_repo,
            profile_repo,
            config,
        }
    }

    // ==========================================
    // 排程
    // ==========================================

    pub fn schedule_topic_to_day(
        &self,
        day: NaiveDate,
        key: SequenceKey,
    ) -> ApiResult<ScheduleOutcome> {
        Ok(self.scheduler.schedule_topic_to_day(day, key)?)
    }

    /// 周内连排 (到周末为止)
    pub fn pack_topic_from_day(
        &self,
        start_day: NaiveDate,
        key: SequenceKey,
    ) -> ApiResult<PackResult> {
        Ok(self.scheduler.pack_topic_from_day(start_day, key)?)
    }

    /// 跨周连排 (后续周懒创建)
    pub fn place_topic_forward(
        &self,
        start_day: NaiveDate,
        key: SequenceKey,
    ) -> ApiResult<PackResult> {
        Ok(self.scheduler.place_topic_forward(start_day, key)?)
    }

    pub fn auto_fill_week(&self, week_start: NaiveDate) -> ApiResult<CalendarWeek> {
        Ok(self.scheduler.auto_fill_week(week_start)?)
    }

    // ==========================================
    // 再平衡
    // ==========================================

    pub fn move_topic_forward(
        &self,
        day: NaiveDate,
        key: SequenceKey,
    ) -> ApiResult<MoveForwardResult> {
        Ok(self.rebalance.move_topic_forward(day, key)?)
    }

    pub fn unschedule_from_day(
        &self,
        day: NaiveDate,
        key: SequenceKey,
    ) -> ApiResult<UnscheduleResult> {
        Ok(self.rebalance.unschedule_from_day(day, key)?)
    }

    pub fn return_topic_to_queue(&self, key: SequenceKey) -> ApiResult<RequeueResult> {
        Ok(self.rebalance.return_topic_to_queue(key)?)
    }

    pub fn finalize_day(&self, day: NaiveDate) -> ApiResult<FinalizeResult> {
        Ok(self.rebalance.finalize_day(day)?)
    }

    // ==========================================
    // 周历维护
    // ==========================================

    /// 读周 (不存在则懒创建并落库: 档案默认容量优先, 无档案时落配置默认)
    pub fn get_week(&self, week_start: NaiveDate) -> ApiResult<CalendarWeek> {
        let default_minutes = self.default_daily_minutes()?;
        Ok(self
            .calendar_repo
            .get_or_init_week(CalendarWeek::week_start_of(week_start), default_minutes)?)
    }

    /// 设置单日容量 (分钟)
    pub fn set_day_capacity(&self, day: NaiveDate, minutes: i64) -> ApiResult<CalendarWeek> {
        if minutes < 0 {
            return Err(ApiError::InvalidInput(format!(
                "日容量不可为负: {}",
                minutes
            )));
        }
        let mut week = self.load_week_for_edit(day)?;
        if week.is_completed(day) {
            return Err(ApiError::BusinessRuleViolation(format!(
                "当日已结算, 禁止修改容量: {}",
                day
            )));
        }
        week.day_capacity_minutes.insert(day, minutes);
        week.updated_at = chrono::Utc::now().naive_utc();
        self.calendar_repo.save_week(&week)?;
        Ok(week)
    }

    /// 设置/取消休息日
    pub fn set_off_day(&self, day: NaiveDate, off: bool) -> ApiResult<CalendarWeek> {
        let mut week = self.load_week_for_edit(day)?;
        if week.is_completed(day) {
            return Err(ApiError::BusinessRuleViolation(format!(
                "当日已结算, 禁止变更休息日: {}",
                day
            )));
        }
        // 有排程在身的日必须先撤排再休息
        if off
            && week
                .assigned_slices
                .get(&day)
                .map(|s| !s.is_empty())
                .unwrap_or(false)
        {
            return Err(ApiError::BusinessRuleViolation(format!(
                "当日仍有排程切片, 禁止标记休息日: {}",
                day
            )));
        }
        week.off_days.insert(day, off);
        week.updated_at = chrono::Utc::now().naive_utc();
        self.calendar_repo.save_week(&week)?;
        Ok(week)
    }

    fn load_week_for_edit(&self, day: NaiveDate) -> ApiResult<CalendarWeek> {
        let default_minutes = self.default_daily_minutes()?;
        Ok(self
            .calendar_repo
            .get_or_init_week(CalendarWeek::week_start_of(day), default_minutes)?)
    }

    fn default_daily_minutes(&self) -> ApiResult<i64> {
        if let Some(profile) = self.profile_repo.find()? {
            return Ok(profile.daily_minutes_default);
        }
        self.config
            .get_i64(config_keys::DEFAULT_DAILY_MINUTES)
            .map_err(|e| ApiError::InternalError(e.to_string()))
    }
}
