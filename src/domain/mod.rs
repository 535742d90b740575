// ==========================================
// 备考学习计划排程系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod calendar;
pub mod curriculum;
pub mod profile;
pub mod progress;
pub mod queue;
pub mod types;

// 重导出核心类型
pub use calendar::{CalendarWeek, DaySlice};
pub use curriculum::{
    CatalogTopic, ChapterRecord, CurriculumIndex, SubtopicRecord, TopicRecord,
};
pub use profile::PlanProfile;
pub use progress::{OverviewStats, QueueEntrySummary};
pub use queue::{QueueEntry, SubtopicUnit};
pub use types::{PriorityBand, QueueState, ScheduleOutcome, SequenceKey, SubtopicStatus};
