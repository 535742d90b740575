// ==========================================
// 备考学习计划排程系统 - 引擎层
// ==========================================
// queue_compiler: 课程目录 → 主队列
// day_filler:     单日贪心填充 (纯内存)
// scheduler:      持久化排程 (单日 / 连排 / 整周)
// rebalance:      事后调整 (顺延 / 撤排 / 退回 / 结算)
// progress:       只读进度投影
// events:         会话事件旁路
// ==========================================

pub mod day_filler;
pub mod events;
pub mod progress;
pub mod queue_compiler;
pub mod rebalance;
pub mod scheduler;

pub use day_filler::DayFiller;
pub use events::{OptionalEventPublisher, SessionEvent, SessionEventPublisher, SessionEventType};
pub use progress::ProgressAggregator;
pub use queue_compiler::{QueueBuildSummary, QueueCompiler};
pub use rebalance::{
    CompletedTopic, FinalizeResult, MoveForwardResult, RebalanceEngine, RequeueResult,
    UnscheduleResult,
};
pub use scheduler::{PackResult, Scheduler};
