// ==========================================
// 备考学习计划排程系统 - 日容量填充引擎
// ==========================================
// 红线: 容量约束优先于填充意愿; 单个子主题绝不跨日拆分
// ==========================================
// 职责: 贪心地把一个主题的待排子主题填入某日剩余容量
// 输入: 队列条目(内存) + 周历(内存) + 目标日
// 输出: ScheduleOutcome; 落位时同步改写条目与周历
// ==========================================

use crate::domain::calendar::{CalendarWeek, DaySlice};
use crate::domain::queue::QueueEntry;
use crate::domain::types::ScheduleOutcome;
use chrono::NaiveDate;

// ==========================================
// DayFiller - 日容量填充引擎
// ==========================================
pub struct DayFiller {
    // 无状态引擎，不需要注入依赖
}

impl DayFiller {
    pub fn new() -> Self {
        Self {}
    }

    /// 单日单主题贪心填充
    ///
    /// 规则:
    /// 1) 已结算日 / 休息日 不落位
    /// 2) 待排索引升序行走; 放得下则占用, 放不下即停(不跳排, 保持主题内次序)
    /// 3) 零/负分钟子主题视为不可落位, 跳过且不占容量
    /// 4) 至少落位一个才改写状态; 零落位不产生任何变更
    pub fn fill_day(
        &self,
        entry: &mut QueueEntry,
        week: &mut CalendarWeek,
        day: NaiveDate,
    ) -> ScheduleOutcome {
        if week.is_completed(day) {
            return ScheduleOutcome::DayFinalized;
        }
        if week.is_off(day) {
            return ScheduleOutcome::OffDay;
        }

        let pending = entry.pending_indices();
        if pending.iter().all(|&idx| entry.minutes_of(idx) <= 0) {
            return ScheduleOutcome::NothingRemaining;
        }

        let mut remaining = week.remaining_capacity(day);
        if remaining <= 0 {
            return ScheduleOutcome::NoCapacity;
        }

        let mut accepted: Vec<u32> = Vec::new();
        let mut placed_minutes = 0i64;
        for idx in pending {
            let minutes = entry.minutes_of(idx);
            if minutes <= 0 {
                // 退化数据: 不可落位, 不占容量, 继续后续索引
                continue;
            }
            if minutes > remaining {
                break;
            }
            accepted.push(idx);
            remaining -= minutes;
            placed_minutes += minutes;
        }

        if accepted.is_empty() {
            return ScheduleOutcome::NoCapacity;
        }

        let slices: Vec<DaySlice> = accepted
            .iter()
            .map(|&idx| Self::slice_of(entry, idx))
            .collect();
        week.append_slices(day, slices.clone());
        entry.mark_scheduled(day, &accepted);

        tracing::debug!(
            day = %day,
            sequence_key = %entry.sequence_key,
            placed = accepted.len(),
            placed_minutes,
            "单日填充完成"
        );
        ScheduleOutcome::Placed {
            slices,
            placed_minutes,
        }
    }

    /// 由条目与索引构造冗余自描述切片
    pub fn slice_of(entry: &QueueEntry, index: u32) -> DaySlice {
        let st = entry.subtopic(index);
        DaySlice {
            sequence_key: entry.sequence_key,
            section: entry.section.clone(),
            chapter_id: entry.chapter_id.clone(),
            chapter_name: entry.chapter_name.clone(),
            topic_id: entry.topic_id.clone(),
            topic_title: entry.topic_name.clone(),
            subtopic_index: index,
            subtopic_id: st.map(|s| s.external_id.clone()).unwrap_or_default(),
            subtopic_name: st.map(|s| s.name.clone()).unwrap_or_default(),
            minutes: st.map(|s| s.minutes).unwrap_or(0),
        }
    }
}

impl Default for DayFiller {
    fn default() -> Self {
        Self::new()
    }
}
