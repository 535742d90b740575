// ==========================================
// 备考学习计划排程系统 - 排程引擎
// ==========================================
// 职责: 把主队列中的子主题落入日容量 (单日 / 周内连排 / 整周自动填充)
// 红线: 任何跨记录变更在单个事务内读-改-写, 防止并发超排
// ==========================================

use crate::config::{config_keys, ConfigManager};
use crate::domain::calendar::CalendarWeek;
use crate::domain::queue::QueueEntry;
use crate::domain::types::{QueueState, ScheduleOutcome, SequenceKey};
use crate::engine::day_filler::DayFiller;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::profile_repo::PlanProfileRepository;
use crate::repository::store::{ScheduleTxn, SchedulingStore};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::instrument;

// ==========================================
// PackResult - 连排结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackResult {
    pub placed_count: usize,   // 落位子主题数
    pub placed_minutes: i64,   // 落位分钟
    pub days_touched: usize,   // 实际落位的天数
    pub exhausted: bool,       // 主题是否已无待排子主题
}

// ==========================================
// WeekCache - 事务内周历缓存
// ==========================================
// 跨周操作在一个事务中触及多个周文档; 缓存避免重复读,
// 脏标记保证只写回实际变更的周
pub(crate) struct WeekCache {
    weeks: BTreeMap<NaiveDate, CalendarWeek>,
    dirty: BTreeSet<NaiveDate>,
}

impl WeekCache {
    pub fn new() -> Self {
        Self {
            weeks: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// 读 (懒创建)
    pub fn get_or_init(
        &mut self,
        txn: &ScheduleTxn<'_>,
        day: NaiveDate,
        default_minutes: i64,
    ) -> RepositoryResult<&mut CalendarWeek> {
        let start = CalendarWeek::week_start_of(day);
        match self.weeks.entry(start) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(v) => Ok(v.insert(txn.get_or_init_week(start, default_minutes)?)),
        }
    }

    /// 读 (缺失即致命)
    pub fn require(
        &mut self,
        txn: &ScheduleTxn<'_>,
        day: NaiveDate,
    ) -> RepositoryResult<&mut CalendarWeek> {
        let start = CalendarWeek::week_start_of(day);
        match self.weeks.entry(start) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(v) => Ok(v.insert(txn.require_week(start)?)),
        }
    }

    pub fn mark_dirty(&mut self, day: NaiveDate) {
        self.dirty.insert(CalendarWeek::week_start_of(day));
    }

    /// 写回全部脏周
    pub fn save_dirty(&self, txn: &ScheduleTxn<'_>) -> RepositoryResult<()> {
        for start in &self.dirty {
            if let Some(week) = self.weeks.get(start) {
                txn.save_week(week)?;
            }
        }
        Ok(())
    }
}

// ==========================================
// Scheduler - 排程引擎
// ==========================================
pub struct Scheduler {
    store: Arc<SchedulingStore>,
    profile_repo: Arc<PlanProfileRepository>,
    config: Arc<ConfigManager>,
    filler: DayFiller,
}

impl Scheduler {
    pub fn new(
        store: Arc<SchedulingStore>,
        profile_repo: Arc<PlanProfileRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            store,
            profile_repo,
            config,
            filler: DayFiller::new(),
        }
    }

    /// 默认日容量: 档案优先, 无档案时取配置
    fn default_daily_minutes(&self) -> RepositoryResult<i64> {
        if let Some(profile) = self.profile_repo.find()? {
            return Ok(profile.daily_minutes_default);
        }
        self.config
            .get_i64(config_keys::DEFAULT_DAILY_MINUTES)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))
    }

    fn max_fill_days(&self) -> i64 {
        self.config.get_i64(config_keys::MAX_FILL_DAYS).unwrap_or(370)
    }

    fn require_schedulable(entry: &QueueEntry) -> RepositoryResult<()> {
        if entry.queue_state == QueueState::Removed {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "主题已移除, 不可排程: sequence_key={}",
                entry.sequence_key
            )));
        }
        Ok(())
    }

    // ==========================================
    // 操作 1: 单日排入
    // ==========================================

    /// 把主题的待排子主题排入指定日
    ///
    /// 非致命结果 (无容量/休息日/已结算/无剩余) 以 ScheduleOutcome 返回;
    /// 主题缺失为致命 NotFound
    #[instrument(skip(self), fields(day = %day, key = %key))]
    pub fn schedule_topic_to_day(
        &self,
        day: NaiveDate,
        key: SequenceKey,
    ) -> RepositoryResult<ScheduleOutcome> {
        let default_minutes = self.default_daily_minutes()?;
        self.store.in_transaction(|txn| {
            let mut entry = txn.require_queue_entry(key)?;
            Self::require_schedulable(&entry)?;
            let mut week = txn.get_or_init_week(day, default_minutes)?;

            let outcome = self.filler.fill_day(&mut entry, &mut week, day);
            if outcome.is_placed() {
                txn.save_queue_entry(&entry)?;
                txn.save_week(&week)?;
            }
            Ok(outcome)
        })
    }

    // ==========================================
    // 操作 2: 周内连排
    // ==========================================

    /// 从起始日起在本周内连排一个主题 (跳过休息日, 到周末为止)
    #[instrument(skip(self), fields(start_day = %start_day, key = %key))]
    pub fn pack_topic_from_day(
        &self,
        start_day: NaiveDate,
        key: SequenceKey,
    ) -> RepositoryResult<PackResult> {
        let week_end = CalendarWeek::week_start_of(start_day) + Duration::days(6);
        self.place_forward(start_day, week_end, key)
    }

    /// 从起始日起跨周连排 (遇到的周懒创建, 受扫描天数上限约束)
    #[instrument(skip(self), fields(start_day = %start_day, key = %key))]
    pub fn place_topic_forward(
        &self,
        start_day: NaiveDate,
        key: SequenceKey,
    ) -> RepositoryResult<PackResult> {
        let horizon = start_day + Duration::days(self.max_fill_days());
        self.place_forward(start_day, horizon, key)
    }

    /// 连排共用路径: [start_day, last_day] 闭区间逐日贪心
    fn place_forward(
        &self,
        start_day: NaiveDate,
        last_day: NaiveDate,
        key: SequenceKey,
    ) -> RepositoryResult<PackResult> {
        let default_minutes = self.default_daily_minutes()?;
        let cap = self.max_fill_days();
        self.store.in_transaction(|txn| {
            let mut entry = txn.require_queue_entry(key)?;
            Self::require_schedulable(&entry)?;

            let mut cache = WeekCache::new();
            let mut result = PackResult {
                placed_count: 0,
                placed_minutes: 0,
                days_touched: 0,
                exhausted: false,
            };
            let mut entry_dirty = false;

            let mut day = start_day;
            let mut examined = 0i64;
            while day <= last_day && examined < cap {
                examined += 1;
                let week = cache.get_or_init(txn, day, default_minutes)?;
                match self.filler.fill_day(&mut entry, week, day) {
                    ScheduleOutcome::Placed { slices, placed_minutes } => {
                        cache.mark_dirty(day);
                        entry_dirty = true;
                        result.placed_count += slices.len();
                        result.placed_minutes += placed_minutes;
                        result.days_touched += 1;
                        // 当日可能仍有剩余待排 (容量不足), 继续下一日
                    }
                    ScheduleOutcome::NothingRemaining => {
                        result.exhausted = true;
                        break;
                    }
                    // 休息日/已结算/无容量: 跳到下一日
                    ScheduleOutcome::OffDay
                    | ScheduleOutcome::DayFinalized
                    | ScheduleOutcome::NoCapacity => {}
                }
                if entry.pending_indices().iter().all(|&i| entry.minutes_of(i) <= 0) {
                    result.exhausted = true;
                    break;
                }
                day += Duration::days(1);
            }

            if entry_dirty {
                txn.save_queue_entry(&entry)?;
                cache.save_dirty(txn)?;
            }
            Ok(result)
        })
    }

    // ==========================================
    // 操作 3: 整周自动填充
    // ==========================================

    /// 自动填充一整周
    ///
    /// 主队列遍历顺序: IN_PROGRESS 条目优先于 QUEUED, 各自按序列键升序;
    /// 逐主题从 max(周一, 今天) 起向后贪心, 跳过休息日与零容量日
    #[instrument(skip(self), fields(week_start = %week_start))]
    pub fn auto_fill_week(&self, week_start: NaiveDate) -> RepositoryResult<CalendarWeek> {
        let default_minutes = self.default_daily_minutes()?;
        let current_day = self
            .profile_repo
            .find()?
            .map(|p| p.current_day)
            .unwrap_or(week_start);

        self.store.in_transaction(|txn| {
            let week_start = CalendarWeek::week_start_of(week_start);
            let mut week = txn.get_or_init_week(week_start, default_minutes)?;

            let days: Vec<NaiveDate> = week
                .days()
                .into_iter()
                .filter(|d| *d >= current_day)
                .collect();
            if days.is_empty() {
                return Ok(week);
            }

            // IN_PROGRESS 优先于 QUEUED
            let mut entries = txn.queue_entries_by_states(&[QueueState::InProgress])?;
            entries.extend(txn.queue_entries_by_states(&[QueueState::Queued])?);

            let mut week_dirty = false;
            'topics: for mut entry in entries {
                let mut entry_dirty = false;
                for &day in &days {
                    match self.filler.fill_day(&mut entry, &mut week, day) {
                        ScheduleOutcome::Placed { .. } => {
                            entry_dirty = true;
                            week_dirty = true;
                        }
                        ScheduleOutcome::NothingRemaining => break,
                        ScheduleOutcome::OffDay
                        | ScheduleOutcome::DayFinalized
                        | ScheduleOutcome::NoCapacity => {}
                    }
                }
                if entry_dirty {
                    txn.save_queue_entry(&entry)?;
                }
                // 整周无剩余容量则提前收束
                if days.iter().all(|d| week.remaining_capacity(*d) <= 0) {
                    break 'topics;
                }
            }

            if week_dirty {
                txn.save_week(&week)?;
            }
            Ok(week)
        })
    }
}
