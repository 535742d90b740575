// ==========================================
// 备考学习计划排程系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 单一共享 SQLite 连接, 所有仓储/引擎/API 在此装配
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{DashboardApi, PlanApi, ScheduleApi};
use crate::config::config_manager::ConfigManager;
use crate::db;
use crate::engine::events::SessionEventPublisher;
use crate::engine::progress::ProgressAggregator;
use crate::engine::queue_compiler::QueueCompiler;
use crate::engine::rebalance::RebalanceEngine;
use crate::engine::scheduler::Scheduler;
use crate::engine::OptionalEventPublisher;
use crate::importer::curriculum_importer::CurriculumImporter;
use crate::repository::calendar_repo::CalendarWeekRepository;
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::import_repo::SqliteCurriculumImportRepository;
use crate::repository::profile_repo::PlanProfileRepository;
use crate::repository::queue_repo::MasterQueueRepository;
use crate::repository::store::SchedulingStore;

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 计划管理API
    pub plan_api: Arc<PlanApi>,

    /// 排程操作API
    pub schedule_api: Arc<ScheduleApi>,

    /// 总览API
    pub dashboard_api: Arc<DashboardApi>,

    /// 主队列仓储 (诊断/工具命令直读)
    pub queue_repo: Arc<MasterQueueRepository>,

    /// 档案仓储
    pub profile_repo: Arc<PlanProfileRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// 流程: 打开共享连接 → 建表 → 版本检查 → 装配仓储/引擎/API
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_event_publisher(db_path, None)
    }

    pub fn with_event_publisher(
        db_path: String,
        event_publisher: Option<Arc<dyn SessionEventPublisher>>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState, 数据库路径: {}", db_path);

        let conn = db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        db::init_schema(&conn).map_err(|e| format!("初始化数据库结构失败: {}", e))?;
        match db::read_schema_version(&conn) {
            Ok(Some(v)) if v != db::CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    found = v,
                    expected = db::CURRENT_SCHEMA_VERSION,
                    "数据库结构版本不匹配, 继续启动"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("读取数据库结构版本失败(将继续启动): {}", e);
            }
        }
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let catalog_repo = Arc::new(CatalogRepository::from_connection(conn.clone()));
        let queue_repo = Arc::new(MasterQueueRepository::from_connection(conn.clone()));
        let calendar_repo = Arc::new(CalendarWeekRepository::from_connection(conn.clone()));
        let profile_repo = Arc::new(PlanProfileRepository::from_connection(conn.clone()));
        let store = Arc::new(SchedulingStore::from_connection(conn.clone()));
        let import_repo = Arc::new(SqliteCurriculumImportRepository::new(
            catalog_repo.clone(),
            conn.clone(),
        ));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        let publisher = match &event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p.clone()),
            None => OptionalEventPublisher::none(),
        };

        let compiler = Arc::new(QueueCompiler::new(
            catalog_repo.clone(),
            queue_repo.clone(),
            config_manager.clone(),
            event_publisher,
        ));
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            profile_repo.clone(),
            config_manager.clone(),
        ));
        let rebalance = Arc::new(RebalanceEngine::new(store.clone(), publisher));
        let aggregator = Arc::new(ProgressAggregator::new(
            queue_repo.clone(),
            calendar_repo.clone(),
            profile_repo.clone(),
            config_manager.clone(),
        ));
        let importer = Arc::new(CurriculumImporter::new(
            import_repo,
            config_manager.clone(),
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let plan_api = Arc::new(PlanApi::new(
            compiler,
            importer,
            queue_repo.clone(),
            calendar_repo.clone(),
            profile_repo.clone(),
            config_manager.clone(),
        ));
        let schedule_api = Arc::new(ScheduleApi::new(
            scheduler,
            rebalance,
            calendar_repo,
            profile_repo.clone(),
            config_manager,
        ));
        let dashboard_api = Arc::new(DashboardApi::new(aggregator));

        tracing::info!("AppState 初始化完成");
        Ok(Self {
            db_path,
            plan_api,
            schedule_api,
            dashboard_api,
            queue_repo,
            profile_repo,
        })
    }
}

// ==========================================
// 默认数据库路径
// ==========================================

/// 获取默认数据库路径
///
/// - 环境变量 STUDY_PLAN_APS_DB_PATH 优先
/// - 开发环境: 用户数据目录/study-plan-aps-dev/study_plan_aps.db
/// - 生产环境: 用户数据目录/study-plan-aps/study_plan_aps.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("STUDY_PLAN_APS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./study_plan_aps.db");
    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("study-plan-aps-dev");
        }
        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("study-plan-aps");
        }

        std::fs::create_dir_all(&path).ok();
        path = path.join("study_plan_aps.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(path.ends_with("study_plan_aps.db"));
    }

    #[test]
    fn test_app_state_bootstraps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("app.db").to_string_lossy().to_string();
        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);
        // 空库上的只读查询直接可用
        assert!(state.profile_repo.find().unwrap().is_none());
        assert_eq!(state.queue_repo.count().unwrap(), 0);
    }
}
