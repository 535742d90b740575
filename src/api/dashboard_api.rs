// ==========================================
// 备考学习计划排程系统 - 总览 API
// ==========================================
// 职责: 只读聚合查询, 供外部 UI 渲染进度总览与队列列表
// ==========================================

use crate::api::error::ApiResult;
use crate::domain::progress::{OverviewStats, QueueEntrySummary};
use crate::domain::types::QueueState;
use crate::engine::progress::ProgressAggregator;
use std::sync::Arc;

pub struct DashboardApi {
    aggregator: Arc<ProgressAggregator>,
}

impl DashboardApi {
    pub fn new(aggregator: Arc<ProgressAggregator>) -> Self {
        Self { aggregator }
    }

    /// 进度总览
    pub fn get_overview_stats(&self) -> ApiResult<OverviewStats> {
        Ok(self.aggregator.compute_overview()?)
    }

    /// 队列列表 (升序; states 为空时返回全部非 REMOVED 条目)
    pub fn list_queue(&self, states: &[QueueState]) -> ApiResult<Vec<QueueEntrySummary>> {
        let mut summaries = self.aggregator.summarize_queue()?;
        if !states.is_empty() {
            let wanted: Vec<&str> = states.iter().map(|s| s.as_str()).collect();
            summaries.retain(|s| wanted.contains(&s.queue_state.as_str()));
        }
        Ok(summaries)
    }
}
