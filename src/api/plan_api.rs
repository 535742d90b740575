// ==========================================
// 备考学习计划排程系统 - 计划管理 API
// ==========================================
// 职责: 建档期操作 - 目录导入 / 主队列构建 / 档案维护 / 计划重置
// 红线: reset_plan 是破坏性操作, 只清排程态, 不动课程目录
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager};
use crate::domain::profile::PlanProfile;
use crate::engine::queue_compiler::{QueueBuildSummary, QueueCompiler};
use crate::importer::curriculum_importer::{CurriculumImporter, ImportResult};
use crate::repository::calendar_repo::CalendarWeekRepository;
use crate::repository::profile_repo::PlanProfileRepository;
use crate::repository::queue_repo::MasterQueueRepository;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

pub struct PlanApi {
    compiler: Arc<QueueCompiler>,
    importer: Arc<CurriculumImporter>,
    queue_repo: Arc<MasterQueueRepository>,
    calendar_repo: Arc<CalendarWeekRepository>,
    profile_repo: Arc<PlanProfileRepository>,
    config: Arc<ConfigManager>,
}

impl PlanApi {
    pub fn new(
        compiler: Arc<QueueCompiler>,
        importer: Arc<CurriculumImporter>,
        queue_repo: Arc<MasterQueueRepository>,
        calendar_repo: Arc<CalendarWeekRepository>,
        profile_repo: Arc<PlanProfileRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            compiler,
            importer,
            queue_repo,
            calendar_repo,
            profile_repo,
            config,
        }
    }

    // ==========================================
    // 目录导入
    // ==========================================

    /// 导入课程目录文件 (CSV / Excel, 全量替换)
    pub async fn import_catalog<P: AsRef<Path> + Send>(&self, path: P) -> ApiResult<ImportResult> {
        Ok(self.importer.import_file(path).await?)
    }

    // ==========================================
    // 主队列构建
    // ==========================================

    /// 从目录与档案构建主队列
    ///
    /// 非强制调用命中已有队列时为无操作 (summary.rebuilt = false)
    pub fn build_master_queue(&self, force_rebuild: bool) -> ApiResult<QueueBuildSummary> {
        let profile = self.profile_repo.require()?;
        Ok(self.compiler.build_master_queue(&profile, force_rebuild)?)
    }

    // ==========================================
    // 档案维护
    // ==========================================

    pub fn get_profile(&self) -> ApiResult<Option<PlanProfile>> {
        Ok(self.profile_repo.find()?)
    }

    pub fn save_profile(&self, profile: &PlanProfile) -> ApiResult<()> {
        if profile.daily_minutes_default <= 0 {
            return Err(ApiError::InvalidInput(
                "默认日容量必须为正数".to_string(),
            ));
        }
        if let Some(exam_date) = profile.target_exam_date {
            if exam_date < profile.start_date {
                return Err(ApiError::InvalidInput(format!(
                    "考试日期 {} 早于开始日期 {}",
                    exam_date, profile.start_date
                )));
            }
        }
        self.profile_repo.save(profile)?;
        Ok(())
    }

    // ==========================================
    // 计划重置
    // ==========================================

    /// 清空主队列/队列元数据/全部周历; 保留课程目录与档案
    #[instrument(skip(self))]
    pub fn reset_plan(&self) -> ApiResult<()> {
        let batch_size = self
            .config
            .get_usize(config_keys::QUEUE_WRITE_BATCH_SIZE)
            .unwrap_or(50)
            .max(1);
        let removed_entries = self.queue_repo.delete_all_batched(batch_size)?;
        self.queue_repo.delete_meta()?;
        let removed_weeks = self.calendar_repo.delete_all()?;
        info!(removed_entries, removed_weeks, "计划已重置");
        Ok(())
    }
}
