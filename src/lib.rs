// ==========================================
// 备考学习计划排程系统 - 库入口
// ==========================================
// 系统定位: 课程目录 → 主队列 → 周历排程 的学习计划排程内核
// 技术栈: Rust + SQLite
// ==========================================

rust_i18n::i18n!("locales", fallback = "zh-CN");

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod i18n;
pub mod importer;
pub mod logging;
pub mod repository;

// 常用类型再导出
pub use domain::calendar::{CalendarWeek, DaySlice};
pub use domain::curriculum::{
    CatalogTopic, ChapterRecord, CurriculumIndex, SubtopicRecord, TopicRecord,
};
pub use domain::profile::PlanProfile;
pub use domain::progress::{OverviewStats, QueueEntrySummary};
pub use domain::queue::{QueueEntry, SubtopicUnit};
pub use domain::types::{
    PriorityBand, QueueState, ScheduleOutcome, SequenceKey, SubtopicStatus,
};
pub use engine::{
    DayFiller, ProgressAggregator, QueueCompiler, RebalanceEngine, Scheduler,
};
pub use api::{DashboardApi, PlanApi, ScheduleApi};

/// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const APP_NAME: &str = "备考学习计划排程系统";

/// 数据库结构版本
pub const DB_VERSION: i64 = db::CURRENT_SCHEMA_VERSION;
