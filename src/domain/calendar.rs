// ==========================================
// 备考学习计划排程系统 - 周历领域模型
// ==========================================
// 职责: 按周持久化的日容量/休息日/已排切片/结算标记
// 红线: 休息日有效容量恒为 0, 与配置容量无关
// ==========================================

use crate::domain::types::SequenceKey;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// DaySlice - 已排切片
// ==========================================
/// 一个子主题在某一日的落位快照
///
/// 冗余自描述: 周历可独立渲染, 无需回查主队列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySlice {
    pub sequence_key: SequenceKey,
    pub section: String,
    pub chapter_id: String,
    pub chapter_name: String,
    pub topic_id: String,
    pub topic_title: String,
    pub subtopic_index: u32,
    pub subtopic_id: String,
    pub subtopic_name: String,
    pub minutes: i64,
}

// ==========================================
// CalendarWeek - 周历
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarWeek {
    /// 周起始日 (周一)
    pub week_start: NaiveDate,
    /// 日 → 可用分钟
    pub day_capacity_minutes: BTreeMap<NaiveDate, i64>,
    /// 日 → 是否休息日
    pub off_days: BTreeMap<NaiveDate, bool>,
    /// 日 → 当日切片 (有序)
    pub assigned_slices: BTreeMap<NaiveDate, Vec<DaySlice>>,
    /// 日 → 是否已结算
    pub day_completed: BTreeMap<NaiveDate, bool>,
    pub updated_at: NaiveDateTime,
}

impl CalendarWeek {
    /// 以默认日容量初始化一周 (懒创建入口)
    pub fn with_default_capacity(week_start: NaiveDate, daily_minutes: i64) -> Self {
        let week_start = Self::week_start_of(week_start);
        let mut day_capacity_minutes = BTreeMap::new();
        for day in Self::days_of(week_start) {
            day_capacity_minutes.insert(day, daily_minutes.max(0));
        }
        Self {
            week_start,
            day_capacity_minutes,
            off_days: BTreeMap::new(),
            assigned_slices: BTreeMap::new(),
            day_completed: BTreeMap::new(),
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// 求某日所在周的周一
    pub fn week_start_of(day: NaiveDate) -> NaiveDate {
        day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
    }

    /// 一周七天 (周一起)
    pub fn days_of(week_start: NaiveDate) -> Vec<NaiveDate> {
        (0..7).map(|i| week_start + Duration::days(i)).collect()
    }

    /// 本周七天
    pub fn days(&self) -> Vec<NaiveDate> {
        Self::days_of(self.week_start)
    }

    /// 某日是否属于本周
    pub fn contains(&self, day: NaiveDate) -> bool {
        Self::week_start_of(day) == self.week_start
    }

    pub fn is_off(&self, day: NaiveDate) -> bool {
        self.off_days.get(&day).copied().unwrap_or(false)
    }

    pub fn is_completed(&self, day: NaiveDate) -> bool {
        self.day_completed.get(&day).copied().unwrap_or(false)
    }

    /// 有效容量: 休息日恒 0
    pub fn effective_capacity(&self, day: NaiveDate) -> i64 {
        if self.is_off(day) {
            0
        } else {
            self.day_capacity_minutes.get(&day).copied().unwrap_or(0)
        }
    }

    /// 当日已占用分钟
    pub fn used_minutes(&self, day: NaiveDate) -> i64 {
        self.assigned_slices
            .get(&day)
            .map(|slices| slices.iter().map(|s| s.minutes).sum())
            .unwrap_or(0)
    }

    /// 当日剩余容量 (可为负, 由调用方判断 ≤0)
    pub fn remaining_capacity(&self, day: NaiveDate) -> i64 {
        self.effective_capacity(day) - self.used_minutes(day)
    }

    /// 追加切片到某日
    pub fn append_slices(&mut self, day: NaiveDate, slices: Vec<DaySlice>) {
        if slices.is_empty() {
            return;
        }
        self.assigned_slices.entry(day).or_default().extend(slices);
    }

    /// 移除某日某主题的全部切片, 返回被移除的切片
    pub fn remove_topic_slices(&mut self, day: NaiveDate, key: SequenceKey) -> Vec<DaySlice> {
        let Some(list) = self.assigned_slices.get_mut(&day) else {
            return Vec::new();
        };
        let (removed, kept): (Vec<DaySlice>, Vec<DaySlice>) =
            list.drain(..).partition(|s| s.sequence_key == key);
        *list = kept;
        if list.is_empty() {
            self.assigned_slices.remove(&day);
        }
        removed
    }

    /// 本周内持有某主题切片的日期列表
    pub fn days_with_topic(&self, key: SequenceKey) -> Vec<NaiveDate> {
        self.assigned_slices
            .iter()
            .filter(|(_, slices)| slices.iter().any(|s| s.sequence_key == key))
            .map(|(day, _)| *day)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        // 2026-08-31 是周一
        NaiveDate::from_ymd_opt(2026, 8, 31).unwrap()
    }

    #[test]
    fn test_week_start_of_normalizes_to_monday() {
        let thursday = NaiveDate::from_ymd_opt(2026, 9, 3).unwrap();
        assert_eq!(CalendarWeek::week_start_of(thursday), monday());
        assert_eq!(CalendarWeek::week_start_of(monday()), monday());
    }

    #[test]
    fn test_default_capacity_covers_seven_days() {
        let week = CalendarWeek::with_default_capacity(monday(), 90);
        assert_eq!(week.days().len(), 7);
        for day in week.days() {
            assert_eq!(week.effective_capacity(day), 90);
        }
    }

    #[test]
    fn test_off_day_forces_zero_capacity() {
        let mut week = CalendarWeek::with_default_capacity(monday(), 90);
        week.off_days.insert(monday(), true);
        assert_eq!(week.effective_capacity(monday()), 0);
        assert_eq!(week.remaining_capacity(monday()), 0);
    }

    #[test]
    fn test_remove_topic_slices_keeps_other_topics() {
        let mut week = CalendarWeek::with_default_capacity(monday(), 90);
        let slice = |key: i64, idx: u32| DaySlice {
            sequence_key: SequenceKey(key),
            section: "数学".to_string(),
            chapter_id: "C1".to_string(),
            chapter_name: "函数".to_string(),
            topic_id: format!("T{}", key),
            topic_title: format!("主题{}", key),
            subtopic_index: idx,
            subtopic_id: format!("S{}", idx),
            subtopic_name: format!("子{}", idx),
            minutes: 30,
        };
        week.append_slices(monday(), vec![slice(1, 0), slice(2, 0), slice(1, 1)]);
        let removed = week.remove_topic_slices(monday(), SequenceKey(1));
        assert_eq!(removed.len(), 2);
        assert_eq!(week.assigned_slices.get(&monday()).unwrap().len(), 1);
        assert_eq!(week.used_minutes(monday()), 30);
    }
}
