// ==========================================
// 备考学习计划排程系统 - 主队列领域模型
// ==========================================
// 职责: 队列条目(每主题一条)与子主题单元
// 不变式:
// - scheduled_minutes 恒等于 scheduled_dates 蕴含的分钟和
// - 同一子主题索引不得同时出现在多个活跃日期下
// - DONE ⇔ 全部子主题已完成
// ==========================================

use crate::domain::types::{QueueState, SequenceKey, SubtopicStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// SubtopicUnit - 子主题单元
// ==========================================
// 不可分割的排程单元; index 在主题生命周期内稳定且唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtopicUnit {
    pub index: u32,           // 主题内稳定索引 (0 起)
    pub external_id: String,  // 目录侧子主题ID
    pub name: String,         // 名称
    pub minutes: i64,         // 时长(分钟)
    pub status: SubtopicStatus, // 显式状态 (PENDING/SCHEDULED/COMPLETED)
}

// ==========================================
// QueueEntry - 队列条目
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub sequence_key: SequenceKey, // 主队列全序键
    pub section: String,
    pub chapter_id: String,
    pub chapter_name: String,
    pub topic_id: String,
    pub topic_name: String,
    /// 有序子主题列表
    pub subtopics: Vec<SubtopicUnit>,
    /// 日期 → 当日已排子主题索引
    pub scheduled_dates: BTreeMap<NaiveDate, Vec<u32>>,
    /// 已排(未必完成)分钟缓存
    pub scheduled_minutes: i64,
    /// 已完成子主题索引
    pub completed_indices: Vec<u32>,
    /// 已完成分钟
    pub completed_minutes: i64,
    pub queue_state: QueueState,
    pub updated_at: NaiveDateTime,
}

impl QueueEntry {
    /// 按索引查子主题
    pub fn subtopic(&self, index: u32) -> Option<&SubtopicUnit> {
        self.subtopics.iter().find(|s| s.index == index)
    }

    fn subtopic_mut(&mut self, index: u32) -> Option<&mut SubtopicUnit> {
        self.subtopics.iter_mut().find(|s| s.index == index)
    }

    /// 指定索引的分钟数 (未知索引计 0)
    pub fn minutes_of(&self, index: u32) -> i64 {
        self.subtopic(index).map(|s| s.minutes).unwrap_or(0)
    }

    /// 主题总分钟 (含已完成)
    pub fn total_minutes(&self) -> i64 {
        self.subtopics.iter().map(|s| s.minutes.max(0)).sum()
    }

    /// 待排子主题索引 (升序)
    ///
    /// 仅 PENDING 状态; 显式状态取代对两处集合做并集推导
    pub fn pending_indices(&self) -> Vec<u32> {
        self.subtopics
            .iter()
            .filter(|s| s.status == SubtopicStatus::Pending)
            .map(|s| s.index)
            .collect()
    }

    /// 是否全部子主题已完成
    pub fn is_fully_completed(&self) -> bool {
        !self.subtopics.is_empty()
            && self
                .subtopics
                .iter()
                .all(|s| s.status == SubtopicStatus::Completed)
    }

    /// 重算 scheduled_minutes 缓存 (以 scheduled_dates 为准)
    pub fn recompute_scheduled_minutes(&mut self) {
        self.scheduled_minutes = self
            .scheduled_dates
            .values()
            .flatten()
            .map(|idx| self.subtopics.iter().find(|s| s.index == *idx).map(|s| s.minutes).unwrap_or(0))
            .sum();
    }

    /// 将一组子主题记为已排在某日
    ///
    /// 前置条件 (由引擎校验): 索引均为 PENDING
    pub fn mark_scheduled(&mut self, day: NaiveDate, indices: &[u32]) {
        if indices.is_empty() {
            return;
        }
        {
            let day_list = self.scheduled_dates.entry(day).or_default();
            for &idx in indices {
                if !day_list.contains(&idx) {
                    day_list.push(idx);
                }
            }
        }
        for &idx in indices {
            if let Some(st) = self.subtopic_mut(idx) {
                st.status = SubtopicStatus::Scheduled;
            }
        }
        self.recompute_scheduled_minutes();
        self.refresh_state();
    }

    /// 从某一日撤下该主题的全部索引, 返回被撤下的索引
    ///
    /// 不触及其他日期; 被撤索引回到 PENDING
    pub fn unschedule_day(&mut self, day: NaiveDate) -> Vec<u32> {
        let removed = self.scheduled_dates.remove(&day).unwrap_or_default();
        for &idx in &removed {
            if let Some(st) = self.subtopic_mut(idx) {
                if st.status == SubtopicStatus::Scheduled {
                    st.status = SubtopicStatus::Pending;
                }
            }
        }
        self.recompute_scheduled_minutes();
        self.refresh_state();
        removed
    }

    /// 清空全部排程 (完整回队), 返回被撤下的 (日期, 索引) 对数
    pub fn unschedule_all(&mut self) -> usize {
        let days: Vec<NaiveDate> = self.scheduled_dates.keys().copied().collect();
        let mut removed = 0usize;
        for day in days {
            removed += self.unschedule_day(day).len();
        }
        removed
    }

    /// 将某日的一个子主题结算为已完成
    ///
    /// 幂等: 已完成索引不重复累计
    pub fn complete_index(&mut self, day: NaiveDate, index: u32) {
        if let Some(list) = self.scheduled_dates.get_mut(&day) {
            list.retain(|i| *i != index);
            if list.is_empty() {
                self.scheduled_dates.remove(&day);
            }
        }
        if !self.completed_indices.contains(&index) {
            self.completed_indices.push(index);
            self.completed_minutes += self.minutes_of(index);
        }
        if let Some(st) = self.subtopic_mut(index) {
            st.status = SubtopicStatus::Completed;
        }
        self.recompute_scheduled_minutes();
        self.refresh_state();
    }

    /// 按不变式派生队列状态
    ///
    /// REMOVED 为显式终态, 不参与派生
    pub fn refresh_state(&mut self) {
        if self.queue_state == QueueState::Removed {
            return;
        }
        if self.is_fully_completed() {
            self.queue_state = QueueState::Done;
        } else if !self.scheduled_dates.is_empty() || !self.completed_indices.is_empty() {
            self.queue_state = QueueState::InProgress;
        } else {
            self.queue_state = QueueState::Queued;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_minutes(minutes: &[i64]) -> QueueEntry {
        QueueEntry {
            sequence_key: SequenceKey(1),
            section: "数学".to_string(),
            chapter_id: "C1".to_string(),
            chapter_name: "函数".to_string(),
            topic_id: "T1".to_string(),
            topic_name: "极限".to_string(),
            subtopics: minutes
                .iter()
                .enumerate()
                .map(|(i, m)| SubtopicUnit {
                    index: i as u32,
                    external_id: format!("S{}", i),
                    name: format!("子{}", i),
                    minutes: *m,
                    status: SubtopicStatus::Pending,
                })
                .collect(),
            scheduled_dates: BTreeMap::new(),
            scheduled_minutes: 0,
            completed_indices: Vec::new(),
            completed_minutes: 0,
            queue_state: QueueState::Queued,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, d).unwrap()
    }

    #[test]
    fn test_mark_scheduled_updates_cache_and_state() {
        let mut e = entry_with_minutes(&[20, 30, 40]);
        e.mark_scheduled(day(1), &[0, 1]);
        assert_eq!(e.scheduled_minutes, 50);
        assert_eq!(e.queue_state, QueueState::InProgress);
        assert_eq!(e.pending_indices(), vec![2]);
    }

    #[test]
    fn test_mark_scheduled_same_day_twice_dedups_indices() {
        let mut e = entry_with_minutes(&[20, 30, 40]);
        e.mark_scheduled(day(1), &[0, 1]);
        e.mark_scheduled(day(1), &[1, 2]);
        assert_eq!(e.scheduled_dates.get(&day(1)), Some(&vec![0, 1, 2]));
        assert_eq!(e.scheduled_minutes, 90);
        assert!(e
            .subtopics
            .iter()
            .all(|s| s.status == SubtopicStatus::Scheduled));
    }

    #[test]
    fn test_unschedule_day_round_trip() {
        let mut e = entry_with_minutes(&[20, 30]);
        e.mark_scheduled(day(1), &[0, 1]);
        let removed = e.unschedule_day(day(1));
        assert_eq!(removed, vec![0, 1]);
        assert_eq!(e.scheduled_minutes, 0);
        assert_eq!(e.queue_state, QueueState::Queued);
        assert_eq!(e.pending_indices(), vec![0, 1]);
    }

    #[test]
    fn test_complete_index_flips_done_on_last() {
        let mut e = entry_with_minutes(&[20, 30]);
        e.mark_scheduled(day(1), &[0, 1]);
        e.complete_index(day(1), 0);
        assert_eq!(e.queue_state, QueueState::InProgress);
        e.complete_index(day(1), 1);
        assert_eq!(e.queue_state, QueueState::Done);
        assert_eq!(e.completed_minutes, 50);
        assert!(e.scheduled_dates.is_empty());
    }

    #[test]
    fn test_complete_index_idempotent() {
        let mut e = entry_with_minutes(&[20]);
        e.mark_scheduled(day(1), &[0]);
        e.complete_index(day(1), 0);
        e.complete_index(day(1), 0);
        assert_eq!(e.completed_minutes, 20);
        assert_eq!(e.completed_indices, vec![0]);
    }

    #[test]
    fn test_partial_completion_keeps_in_progress_after_unschedule() {
        let mut e = entry_with_minutes(&[20, 30]);
        e.mark_scheduled(day(1), &[0]);
        e.complete_index(day(1), 0);
        e.mark_scheduled(day(2), &[1]);
        e.unschedule_day(day(2));
        // 已有完成索引时回落到 IN_PROGRESS 而非 QUEUED
        assert_eq!(e.queue_state, QueueState::InProgress);
    }
}
