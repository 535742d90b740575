// ==========================================
// 备考学习计划排程系统 - 引擎层事件发布
// ==========================================
// 职责: 定义学习会话事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，外部成就/连胜子系统实现适配器
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 会话事件类型
// ==========================================

/// 引擎层发布的事件类型, 用于通知下游系统
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEventType {
    /// 主队列重建完成
    QueueRebuilt,
    /// 某日结算完成
    DayFinalized,
    /// 某主题全部完成
    TopicCompleted,
}

impl SessionEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            SessionEventType::QueueRebuilt => "QueueRebuilt",
            SessionEventType::DayFinalized => "DayFinalized",
            SessionEventType::TopicCompleted => "TopicCompleted",
        }
    }
}

/// 学习会话事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// 事件类型
    pub event_type: SessionEventType,
    /// 相关日期 (结算事件)
    pub day: Option<NaiveDate>,
    /// 相关主题序列键
    pub sequence_key: Option<i64>,
    /// 相关主题ID
    pub topic_id: Option<String>,
    /// 涉及分钟数
    pub minutes: i64,
    /// 发生时间
    pub occurred_at: NaiveDateTime,
}

impl SessionEvent {
    pub fn queue_rebuilt(total_minutes: i64) -> Self {
        Self {
            event_type: SessionEventType::QueueRebuilt,
            day: None,
            sequence_key: None,
            topic_id: None,
            minutes: total_minutes,
            occurred_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn day_finalized(day: NaiveDate, minutes: i64) -> Self {
        Self {
            event_type: SessionEventType::DayFinalized,
            day: Some(day),
            sequence_key: None,
            topic_id: None,
            minutes,
            occurred_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn topic_completed(sequence_key: i64, topic_id: String, minutes: i64) -> Self {
        Self {
            event_type: SessionEventType::TopicCompleted,
            day: None,
            sequence_key: Some(sequence_key),
            topic_id: Some(topic_id),
            minutes,
            occurred_at: chrono::Utc::now().naive_utc(),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 会话事件发布者 Trait
///
/// Engine 层定义，外部分析子系统实现
/// 通过 trait 实现依赖倒置，引擎不感知成就/连胜逻辑
pub trait SessionEventPublisher: Send + Sync {
    /// 发布会话事件
    fn publish(&self, event: SessionEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn SessionEventPublisher>> 的使用
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn SessionEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn SessionEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者; 发布失败仅告警, 不影响排程事务）
    pub fn publish(&self, event: SessionEvent) {
        if let Some(publisher) = &self.inner {
            if let Err(e) = publisher.publish(event.clone()) {
                tracing::warn!(
                    event_type = event.event_type.as_str(),
                    error = %e,
                    "会话事件发布失败"
                );
            }
        } else {
            tracing::debug!(
                event_type = event.event_type.as_str(),
                "未配置事件发布者，跳过事件"
            );
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
