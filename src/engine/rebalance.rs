// ==========================================
// 备考学习计划排程系统 - 再平衡引擎
// ==========================================
// 职责: 对已排程结果做事后调整 (顺延 / 撤排 / 退回队尾 / 当日结算)
// 红线 1: 守恒 - 顺延操作移出的分钟 = 重排落位分钟 + 溢出分钟
// 红线 2: 结算不可逆 - 已结算日禁止撤排与容量变更
// ==========================================

use crate::domain::calendar::{CalendarWeek, DaySlice};
use crate::domain::types::{SequenceKey, SubtopicStatus};
use crate::engine::day_filler::DayFiller;
use crate::engine::events::{OptionalEventPublisher, SessionEvent};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::SchedulingStore;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

// ==========================================
// 结果类型
// ==========================================

/// 顺延结果: moved + overflow 两部分合计守恒
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveForwardResult {
    pub moved_count: usize,
    pub moved_minutes: i64,
    pub overflow_count: usize,
    pub overflow_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnscheduleResult {
    pub removed_count: usize,
    pub removed_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequeueResult {
    pub removed_count: usize,
    pub removed_minutes: i64,
    pub new_sequence_key: SequenceKey,
}

/// 结算后整题完成的主题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedTopic {
    pub sequence_key: SequenceKey,
    pub topic_id: String,
    pub total_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResult {
    pub already_finalized: bool,
    pub completed_item_count: usize,
    pub completed_minutes: i64,
    /// 本次结算后整题完成的主题
    pub topics_completed: Vec<CompletedTopic>,
}

// ==========================================
// RebalanceEngine - 再平衡引擎
// ==========================================
pub struct RebalanceEngine {
    store: Arc<SchedulingStore>,
    event_publisher: OptionalEventPublisher,
}

impl RebalanceEngine {
    pub fn new(store: Arc<SchedulingStore>, event_publisher: OptionalEventPublisher) -> Self {
        Self {
            store,
            event_publisher,
        }
    }

    // ==========================================
    // 操作 1: 主题顺延
    // ==========================================

    /// 把主题从某日顺延: 移出当日切片, 连同本周后续日已有切片一起
    /// 向后重排; 放不下的溢出索引回到 PENDING, 留待重新入排
    ///
    /// 周缺失为致命错误 (未排过程的周无从顺延)
    #[instrument(skip(self), fields(day = %day, key = %key))]
    pub fn move_topic_forward(
        &self,
        day: NaiveDate,
        key: SequenceKey,
    ) -> RepositoryResult<MoveForwardResult> {
        self.store.in_transaction(|txn| {
            let mut entry = txn.require_queue_entry(key)?;
            let mut week = txn.require_week(CalendarWeek::week_start_of(day))?;
            if week.is_completed(day) {
                return Err(RepositoryError::BusinessRuleViolation(format!(
                    "当日已结算, 禁止顺延: {}",
                    day
                )));
            }

            // 第一步: 回收当日与本周后续日的该主题切片, 汇成候选池
            let mut candidates: Vec<u32> = Vec::new();
            let mut recovered_minutes = 0i64;
            for d in week.days() {
                if d < day {
                    continue;
                }
                // 已结算日的切片是历史记录, 不回收
                if week.is_completed(d) {
                    continue;
                }
                let removed = week.remove_topic_slices(d, key);
                if removed.is_empty() {
                    continue;
                }
                recovered_minutes += removed.iter().map(|s| s.minutes).sum::<i64>();
                candidates.extend(entry.unschedule_day(d));
            }
            if candidates.is_empty() {
                return Ok(MoveForwardResult {
                    moved_count: 0,
                    moved_minutes: 0,
                    overflow_count: 0,
                    overflow_minutes: 0,
                });
            }
            candidates.sort_unstable();
            candidates.dedup();

            // 已完成索引重现在排程里属于数据损坏
            for &idx in &candidates {
                if entry
                    .subtopic(idx)
                    .map(|s| s.status == SubtopicStatus::Completed)
                    .unwrap_or(false)
                {
                    return Err(RepositoryError::ConsistencyViolation(format!(
                        "已完成子主题出现在待顺延切片中: key={} index={}",
                        key, idx
                    )));
                }
            }

            // 第二步: 从次日起在本周内重排候选池 (保持主题内次序, 不跳排)
            let mut placed_count = 0usize;
            let mut placed_minutes = 0i64;
            let mut replay_day = day + Duration::days(1);
            let week_end = week.week_start + Duration::days(6);
            while replay_day <= week_end && !candidates.is_empty() {
                if !week.is_off(replay_day) && !week.is_completed(replay_day) {
                    let mut remaining = week.remaining_capacity(replay_day);
                    let mut accepted: Vec<u32> = Vec::new();
                    for &idx in candidates.iter() {
                        let minutes = entry.minutes_of(idx);
                        if minutes <= 0 {
                            accepted.push(idx);
                            continue;
                        }
                        if minutes > remaining {
                            break;
                        }
                        accepted.push(idx);
                        remaining -= minutes;
                    }
                    let real: Vec<u32> = accepted
                        .iter()
                        .copied()
                        .filter(|&i| entry.minutes_of(i) > 0)
                        .collect();
                    if !real.is_empty() {
                        let slices: Vec<DaySlice> = real
                            .iter()
                            .map(|&i| DayFiller::slice_of(&entry, i))
                            .collect();
                        placed_count += slices.len();
                        placed_minutes += slices.iter().map(|s| s.minutes).sum::<i64>();
                        week.append_slices(replay_day, slices);
                        entry.mark_scheduled(replay_day, &real);
                    }
                    candidates.retain(|i| !accepted.contains(i));
                }
                replay_day += Duration::days(1);
            }

            // 第三步: 守恒校验 - 回收的分钟必须全部去向明确
            let overflow_minutes: i64 = candidates.iter().map(|&i| entry.minutes_of(i)).sum();
            if placed_minutes + overflow_minutes != recovered_minutes {
                return Err(RepositoryError::ConsistencyViolation(format!(
                    "顺延分钟不守恒: 回收 {} != 落位 {} + 溢出 {}",
                    recovered_minutes, placed_minutes, overflow_minutes
                )));
            }

            entry.refresh_state();
            txn.save_queue_entry(&entry)?;
            txn.save_week(&week)?;

            tracing::info!(
                day = %day,
                sequence_key = %key,
                moved = placed_count,
                overflow = candidates.len(),
                "主题顺延完成"
            );
            Ok(MoveForwardResult {
                moved_count: placed_count,
                moved_minutes: placed_minutes,
                overflow_count: candidates.len(),
                overflow_minutes,
            })
        })
    }

    // ==========================================
    // 操作 2: 单日撤排
    // ==========================================

    /// 从某日移除一个主题的全部切片, 对应索引回到 PENDING
    #[instrument(skip(self), fields(day = %day, key = %key))]
    pub fn unschedule_from_day(
        &self,
        day: NaiveDate,
        key: SequenceKey,
    ) -> RepositoryResult<UnscheduleResult> {
        self.store.in_transaction(|txn| {
            let mut entry = txn.require_queue_entry(key)?;
            let mut week = txn.require_week(CalendarWeek::week_start_of(day))?;
            if week.is_completed(day) {
                return Err(RepositoryError::BusinessRuleViolation(format!(
                    "当日已结算, 禁止撤排: {}",
                    day
                )));
            }

            let removed = week.remove_topic_slices(day, key);
            if removed.is_empty() {
                return Ok(UnscheduleResult {
                    removed_count: 0,
                    removed_minutes: 0,
                });
            }
            let removed_minutes: i64 = removed.iter().map(|s| s.minutes).sum();
            entry.unschedule_day(day);
            entry.refresh_state();

            txn.save_queue_entry(&entry)?;
            txn.save_week(&week)?;
            Ok(UnscheduleResult {
                removed_count: removed.len(),
                removed_minutes,
            })
        })
    }

    // ==========================================
    // 操作 3: 退回队尾
    // ==========================================

    /// 把主题的全部未结算排程撤销并重新编号到队尾
    ///
    /// 已完成的子主题保持 COMPLETED 不动; 有完成记录的主题退回后
    /// 仍是 IN_PROGRESS, 全新主题退回后是 QUEUED
    #[instrument(skip(self), fields(key = %key))]
    pub fn return_topic_to_queue(&self, key: SequenceKey) -> RepositoryResult<RequeueResult> {
        self.store.in_transaction(|txn| {
            let mut entry = txn.require_queue_entry(key)?;

            let mut removed_count = 0usize;
            let mut removed_minutes = 0i64;
            for week_start in txn.all_week_starts()? {
                let mut week = txn.require_week(week_start)?;
                let mut dirty = false;
                for d in week.days() {
                    if week.is_completed(d) {
                        continue;
                    }
                    let removed = week.remove_topic_slices(d, key);
                    if !removed.is_empty() {
                        removed_count += removed.len();
                        removed_minutes += removed.iter().map(|s| s.minutes).sum::<i64>();
                        entry.unschedule_day(d);
                        dirty = true;
                    }
                }
                if dirty {
                    txn.save_week(&week)?;
                }
            }

            // 队尾 = 现存最大序列键 + 1, 序列键单调不回收
            let max = txn.max_sequence_key()?.unwrap_or(SequenceKey::FIRST);
            let new_key = max.next();
            let old_key = entry.sequence_key;
            entry.sequence_key = new_key;
            entry.refresh_state();
            txn.rekey_queue_entry(old_key, &entry)?;

            tracing::info!(
                old_key = %old_key,
                new_key = %new_key,
                removed = removed_count,
                "主题退回队尾"
            );
            Ok(RequeueResult {
                removed_count,
                removed_minutes,
                new_sequence_key: new_key,
            })
        })
    }

    // ==========================================
    // 操作 4: 当日结算
    // ==========================================

    /// 结算一日: 当日全部切片标记完成, 日标记为已结算
    ///
    /// 重复结算是非致命空操作; 事件在事务提交后发布
    #[instrument(skip(self), fields(day = %day))]
    pub fn finalize_day(&self, day: NaiveDate) -> RepositoryResult<FinalizeResult> {
        let result = self.store.in_transaction(|txn| {
            let mut week = txn.require_week(CalendarWeek::week_start_of(day))?;
            if week.is_completed(day) {
                return Ok(FinalizeResult {
                    already_finalized: true,
                    completed_item_count: 0,
                    completed_minutes: 0,
                    topics_completed: Vec::new(),
                });
            }

            let slices: Vec<DaySlice> = week
                .assigned_slices
                .get(&day)
                .cloned()
                .unwrap_or_default();

            // 按主题分组, 一题一读一写
            let mut by_topic: BTreeMap<SequenceKey, Vec<&DaySlice>> = BTreeMap::new();
            for s in &slices {
                by_topic.entry(s.sequence_key).or_default().push(s);
            }

            let mut completed_minutes = 0i64;
            let mut topics_completed: Vec<CompletedTopic> = Vec::new();
            for (seq, topic_slices) in &by_topic {
                let mut entry = txn.require_queue_entry(*seq)?;
                for s in topic_slices {
                    entry.complete_index(day, s.subtopic_index);
                    completed_minutes += s.minutes;
                }
                entry.refresh_state();
                if entry.is_fully_completed() {
                    topics_completed.push(CompletedTopic {
                        sequence_key: entry.sequence_key,
                        topic_id: entry.topic_id.clone(),
                        total_minutes: entry.total_minutes(),
                    });
                }
                txn.save_queue_entry(&entry)?;
            }

            // 切片保留在周历上用于回放, 仅打结算标记
            week.day_completed.insert(day, true);
            week.updated_at = chrono::Utc::now().naive_utc();
            txn.save_week(&week)?;

            Ok(FinalizeResult {
                already_finalized: false,
                completed_item_count: slices.len(),
                completed_minutes,
                topics_completed,
            })
        })?;

        if !result.already_finalized {
            self.event_publisher
                .publish(SessionEvent::day_finalized(day, result.completed_minutes));
            for topic in &result.topics_completed {
                self.event_publisher.publish(SessionEvent::topic_completed(
                    topic.sequence_key.0,
                    topic.topic_id.clone(),
                    topic.total_minutes,
                ));
            }
        }
        Ok(result)
    }
}
