// ==========================================
// 备考学习计划排程系统 - 目录导入仓储
// ==========================================
// 职责: 导入引擎的持久化接口 (trait) 与 SQLite 实现
// 说明: trait 化便于导入引擎单测注入失败场景 (重试/退避路径)
// ==========================================

use crate::domain::curriculum::{ChapterRecord, SubtopicRecord, TopicRecord};
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ==========================================
// ImportBatchRecord - 导入批次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatchRecord {
    pub batch_id: String,
    pub file_name: String,
    pub total_rows: usize,
    pub imported_rows: usize,
    pub skipped_rows: usize,
    pub status: String, // DONE / PARTIAL / FAILED
    pub created_at: NaiveDateTime,
}

// ==========================================
// CurriculumImportRepository - 导入仓储接口
// ==========================================

/// 导入引擎依赖的持久化接口
#[async_trait]
pub trait CurriculumImportRepository: Send + Sync {
    /// 写入一批目录记录 (单事务)
    async fn save_catalog_batch(
        &self,
        chapters: &[ChapterRecord],
        topics: &[TopicRecord],
        subtopics: &[SubtopicRecord],
    ) -> RepositoryResult<()>;

    /// 记录导入批次
    async fn record_batch(&self, batch: &ImportBatchRecord) -> RepositoryResult<()>;

    /// 清空现有目录 (全量重导入)
    async fn clear_catalog(&self) -> RepositoryResult<()>;
}

// ==========================================
// SqliteCurriculumImportRepository - SQLite 实现
// ==========================================

pub struct SqliteCurriculumImportRepository {
    catalog_repo: Arc<CatalogRepository>,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCurriculumImportRepository {
    pub fn new(catalog_repo: Arc<CatalogRepository>, conn: Arc<Mutex<Connection>>) -> Self {
        Self { catalog_repo, conn }
    }
}

#[async_trait]
impl CurriculumImportRepository for SqliteCurriculumImportRepository {
    async fn save_catalog_batch(
        &self,
        chapters: &[ChapterRecord],
        topics: &[TopicRecord],
        subtopics: &[SubtopicRecord],
    ) -> RepositoryResult<()> {
        self.catalog_repo.save_batch(chapters, topics, subtopics)
    }

    async fn record_batch(&self, batch: &ImportBatchRecord) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        conn.execute(
            "INSERT INTO import_batch (batch_id, file_name, total_rows, imported_rows, skipped_rows, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                batch.batch_id,
                batch.file_name,
                batch.total_rows as i64,
                batch.imported_rows as i64,
                batch.skipped_rows as i64,
                batch.status,
                batch.created_at,
            ],
        )?;
        Ok(())
    }

    async fn clear_catalog(&self) -> RepositoryResult<()> {
        self.catalog_repo.delete_all()?;
        Ok(())
    }
}
