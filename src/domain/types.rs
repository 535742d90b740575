// ==========================================
// 备考学习计划排程系统 - 领域类型定义
// ==========================================
// 红线: 等级制优先带,不是评分制
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 序列键 (Sequence Key)
// ==========================================
// 主队列的全序键: 单调递增整数
// 说明: 取代"零填充字符串键"的字典序技巧，比较即数值比较
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct SequenceKey(pub i64);

impl SequenceKey {
    /// 队列首个键（编译器从 1 开始编号）
    pub const FIRST: SequenceKey = SequenceKey(1);

    /// 下一个键
    pub fn next(self) -> SequenceKey {
        SequenceKey(self.0 + 1)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SequenceKey {
    fn from(v: i64) -> Self {
        SequenceKey(v)
    }
}

// ==========================================
// 优先带 (Priority Band)
// ==========================================
// 主队列按优先带交织: HIGH → MEDIUM → LOW → UNCLASSIFIED
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityBand {
    High,         // 核心考点
    Medium,       // 常规考点
    Low,          // 次要内容
    Unclassified, // 未分类
}

impl PriorityBand {
    /// 固定的带遍历顺序
    pub const BAND_ORDER: [PriorityBand; 4] = [
        PriorityBand::High,
        PriorityBand::Medium,
        PriorityBand::Low,
        PriorityBand::Unclassified,
    ];

    /// 从目录分类字段解析优先带
    ///
    /// 空值/未知值归入 Unclassified
    pub fn from_category(category: Option<&str>) -> Self {
        match category.map(|c| c.trim().to_ascii_uppercase()) {
            Some(c) if c == "HIGH" => PriorityBand::High,
            Some(c) if c == "MEDIUM" => PriorityBand::Medium,
            Some(c) if c == "LOW" => PriorityBand::Low,
            _ => PriorityBand::Unclassified,
        }
    }

    /// 带内排序秩 (数值越小越靠前)
    pub fn rank(&self) -> u8 {
        match self {
            PriorityBand::High => 0,
            PriorityBand::Medium => 1,
            PriorityBand::Low => 2,
            PriorityBand::Unclassified => 3,
        }
    }
}

impl fmt::Display for PriorityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriorityBand::High => write!(f, "HIGH"),
            PriorityBand::Medium => write!(f, "MEDIUM"),
            PriorityBand::Low => write!(f, "LOW"),
            PriorityBand::Unclassified => write!(f, "UNCLASSIFIED"),
        }
    }
}

// ==========================================
// 队列状态 (Queue State)
// ==========================================
// 不变式:
// - DONE ⇔ 全部子主题已完成(或零子主题主题被显式完成)
// - IN_PROGRESS ⇔ 存在已排日期且未全部完成
// - REMOVED 条目不得持有任何已排日期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueState {
    Queued,     // 排队中
    InProgress, // 进行中
    Done,       // 已完成
    Removed,    // 已移除
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Queued => "QUEUED",
            QueueState::InProgress => "IN_PROGRESS",
            QueueState::Done => "DONE",
            QueueState::Removed => "REMOVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(QueueState::Queued),
            "IN_PROGRESS" => Some(QueueState::InProgress),
            "DONE" => Some(QueueState::Done),
            "REMOVED" => Some(QueueState::Removed),
            _ => None,
        }
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 子主题状态 (Subtopic Status)
// ==========================================
// 设计说明: 显式状态枚举取代"扫描 scheduledDates 与 completedIndices
// 并集"的隐式推导，从构造上排除重复占位类缺陷
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubtopicStatus {
    Pending,   // 待排
    Scheduled, // 已排
    Completed, // 已完成
}

impl fmt::Display for SubtopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl SubtopicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtopicStatus::Pending => "PENDING",
            SubtopicStatus::Scheduled => "SCHEDULED",
            SubtopicStatus::Completed => "COMPLETED",
        }
    }
}

// ==========================================
// 排程结果 (Schedule Outcome)
// ==========================================
// 非致命结果以结构化值返回，不抛异常（调用方据此分支并提示外部 UI）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleOutcome {
    /// 至少排入一个子主题
    Placed {
        slices: Vec<super::calendar::DaySlice>,
        placed_minutes: i64,
    },
    /// 当日剩余容量不足
    NoCapacity,
    /// 当日为休息日
    OffDay,
    /// 当日已结算，拒绝继续排入
    DayFinalized,
    /// 该主题已无待排子主题
    NothingRemaining,
}

impl ScheduleOutcome {
    /// 是否为成功落位
    pub fn is_placed(&self) -> bool {
        matches!(self, ScheduleOutcome::Placed { .. })
    }

    /// 本次落位的分钟数（非落位结果为 0）
    pub fn placed_minutes(&self) -> i64 {
        match self {
            ScheduleOutcome::Placed { placed_minutes, .. } => *placed_minutes,
            _ => 0,
        }
    }

    /// 用户可见的状态消息 (i18n)
    pub fn message(&self) -> String {
        match self {
            ScheduleOutcome::Placed { slices, .. } => crate::i18n::t_with_args(
                "schedule.placed",
                &[("count", &slices.len().to_string())],
            ),
            ScheduleOutcome::NoCapacity => crate::i18n::t("schedule.no_capacity"),
            ScheduleOutcome::OffDay => crate::i18n::t("schedule.off_day"),
            ScheduleOutcome::DayFinalized => crate::i18n::t("schedule.day_finalized"),
            ScheduleOutcome::NothingRemaining => crate::i18n::t("schedule.nothing_remaining"),
        }
    }
}
