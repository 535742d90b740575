// ==========================================
// 备考学习计划排程系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod calendar_repo;
pub mod catalog_repo;
pub mod error;
pub mod import_repo;
pub mod profile_repo;
pub mod queue_repo;
pub mod store;

// 重导出核心仓储
pub use calendar_repo::CalendarWeekRepository;
pub use catalog_repo::CatalogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use import_repo::{
    CurriculumImportRepository, ImportBatchRecord, SqliteCurriculumImportRepository,
};
pub use profile_repo::PlanProfileRepository;
pub use queue_repo::{MasterQueueRepository, QueueMetaRecord, QUEUE_WRITE_BATCH_SIZE};
pub use store::{ScheduleTxn, SchedulingStore};
