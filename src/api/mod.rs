// ==========================================
// 备考学习计划排程系统 - API层
// ==========================================
// plan_api:      建档期操作 (导入/建队列/档案/重置)
// schedule_api:  排程与再平衡操作
// dashboard_api: 只读聚合查询
// ==========================================

pub mod dashboard_api;
pub mod error;
pub mod plan_api;
pub mod schedule_api;

pub use dashboard_api::DashboardApi;
pub use error::{ApiError, ApiResult};
pub use plan_api::PlanApi;
pub use schedule_api::ScheduleApi;
