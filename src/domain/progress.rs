// ==========================================
// 备考学习计划排程系统 - 进度统计领域模型
// ==========================================
// 职责: 只读投影的返回结构, 供外部 UI 渲染
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 总览统计
///
/// ProgressAggregator 的纯投影输出, 不承载任何可变状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewStats {
    /// 总体进度 completed/total (总分钟为 0 时为 None)
    pub overall_progress: Option<f64>,
    /// 已完成分钟
    pub minutes_studied: i64,
    /// 已排程(未完成)分钟
    pub minutes_scheduled: i64,
    /// 计划总分钟
    pub minutes_total: i64,
    /// 已完成主题数
    pub topics_completed: usize,
    /// 主题总数 (不含 REMOVED)
    pub topics_total: usize,
    /// 预计完成日期 (剩余为 0 或队列为空时为 None)
    pub projected_end_date: Option<NaiveDate>,
}

/// 队列条目摘要 (列表视图用, 不展开子主题)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntrySummary {
    pub sequence_key: i64,
    pub section: String,
    pub chapter_name: String,
    pub topic_id: String,
    pub topic_name: String,
    pub queue_state: String,
    pub total_minutes: i64,
    pub scheduled_minutes: i64,
    pub completed_minutes: i64,
    pub subtopic_count: usize,
}
