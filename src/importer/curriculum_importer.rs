// ==========================================
// 备考学习计划排程系统 - 课程目录导入器
// ==========================================
// 职责: 从 CSV/Excel 文件导入课程目录 (科目/章/主题/子主题)
// 流程: 解析 → 校验 → 分批落库(带退避重试) → 记录批次
// 约定: 一行一个子主题, 章/主题字段逐行重复, 首次出现者生效
// ==========================================

use crate::config::{config_keys, ConfigManager};
use crate::domain::curriculum::{ChapterRecord, SubtopicRecord, TopicRecord};
use crate::importer::error::ImportError;
use crate::repository::import_repo::{CurriculumImportRepository, ImportBatchRecord};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 必需表头 (顺序不限, 大小写不敏感)
const REQUIRED_HEADERS: [&str; 6] = [
    "section",
    "chapter_id",
    "chapter_name",
    "topic_id",
    "topic_name",
    "subtopic_name",
];

// ==========================================
// 行模型与结果
// ==========================================

/// 文件中的一行 (已按表头取值, 未校验)
#[derive(Debug, Clone, Default)]
struct CatalogRow {
    section: String,
    chapter_id: String,
    chapter_name: String,
    chapter_category: Option<String>,
    chapter_rank: Option<i32>,
    topic_id: String,
    topic_name: String,
    topic_category: Option<String>,
    topic_order: Option<i32>,
    est_minutes: Option<i64>,
    subtopic_id: String,
    subtopic_name: String,
    subtopic_order: Option<i32>,
    subtopic_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowViolation {
    pub row_number: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub batch_id: String,
    pub total_rows: usize,
    pub imported_rows: usize,
    pub skipped_rows: usize,
    pub chapters: usize,
    pub topics: usize,
    pub subtopics: usize,
    pub violations: Vec<RowViolation>,
}

// ==========================================
// CurriculumImporter - 目录导入器
// ==========================================
pub struct CurriculumImporter {
    import_repo: Arc<dyn CurriculumImportRepository>,
    config: Arc<ConfigManager>,
}

impl CurriculumImporter {
    pub fn new(import_repo: Arc<dyn CurriculumImportRepository>, config: Arc<ConfigManager>) -> Self {
        Self {
            import_repo,
            config,
        }
    }

    // ==========================================
    // 入口: 按扩展名分派
    // ==========================================

    /// 全量导入一个目录文件 (清空旧目录后写入)
    #[instrument(skip(self, path))]
    pub async fn import_file<P: AsRef<Path> + Send>(
        &self,
        path: P,
    ) -> Result<ImportResult, ImportError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let rows = match ext.as_str() {
            "csv" => Self::parse_csv(path)?,
            "xlsx" | "xls" => Self::parse_excel(path)?,
            _ => return Err(ImportError::UnsupportedFormat(path.display().to_string())),
        };
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        self.import_rows(file_name, rows).await
    }

    // ==========================================
    // 解析
    // ==========================================

    fn parse_csv(path: &Path) -> Result<Vec<(usize, CatalogRow)>, ImportError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .map_err(|e| ImportError::CsvParseError(e.to_string()))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ImportError::CsvParseError(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        Self::check_headers(&headers)?;

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ImportError::CsvParseError(e.to_string()))?;
            let cells: BTreeMap<&str, &str> = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.as_str(), v))
                .collect();
            // 行号按文件计: 表头占第 1 行
            rows.push((i + 2, Self::row_from_cells(&cells)));
        }
        Ok(rows)
    }

    fn parse_excel(path: &Path) -> Result<Vec<(usize, CatalogRow)>, ImportError> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| ImportError::ExcelParseError(e.to_string()))?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("工作簿为空".to_string()))?;
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

        let mut iter = range.rows();
        let headers: Vec<String> = iter
            .next()
            .ok_or_else(|| ImportError::ExcelParseError("工作表无表头行".to_string()))?
            .iter()
            .map(|c| c.to_string().trim().to_ascii_lowercase())
            .collect();
        Self::check_headers(&headers)?;

        let mut rows = Vec::new();
        for (i, raw) in iter.enumerate() {
            let values: Vec<String> = raw.iter().map(|c| c.to_string()).collect();
            // 跳过整行空白
            if values.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            let cells: BTreeMap<&str, &str> = headers
                .iter()
                .zip(values.iter())
                .map(|(h, v)| (h.as_str(), v.as_str()))
                .collect();
            rows.push((i + 2, Self::row_from_cells(&cells)));
        }
        Ok(rows)
    }

    fn check_headers(headers: &[String]) -> Result<(), ImportError> {
        for required in REQUIRED_HEADERS {
            if !headers.iter().any(|h| h == required) {
                return Err(ImportError::MissingHeader(required.to_string()));
            }
        }
        Ok(())
    }

    fn row_from_cells(cells: &BTreeMap<&str, &str>) -> CatalogRow {
        let get = |key: &str| cells.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let opt = |key: &str| {
            let v = get(key);
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        };
        CatalogRow {
            section: get("section"),
            chapter_id: get("chapter_id"),
            chapter_name: get("chapter_name"),
            chapter_category: opt("chapter_category"),
            chapter_rank: opt("chapter_rank").and_then(|v| v.parse().ok()),
            topic_id: get("topic_id"),
            topic_name: get("topic_name"),
            topic_category: opt("topic_category"),
            topic_order: opt("topic_order").and_then(|v| v.parse().ok()),
            est_minutes: opt("est_minutes").and_then(|v| v.parse().ok()),
            subtopic_id: get("subtopic_id"),
            subtopic_name: get("subtopic_name"),
            subtopic_order: opt("subtopic_order").and_then(|v| v.parse().ok()),
            subtopic_minutes: opt("subtopic_minutes")
                .and_then(|v| v.parse().ok())
                .unwrap_or(-1), // -1 哨兵: 缺失/非数值, 校验阶段报行级违规
        }
    }

    // ==========================================
    // 校验
    // ==========================================

    fn validate_row(row_number: usize, row: &CatalogRow) -> Option<RowViolation> {
        let mut problems: Vec<&str> = Vec::new();
        if row.section.is_empty() {
            problems.push("section 为空");
        }
        if row.chapter_id.is_empty() {
            problems.push("chapter_id 为空");
        }
        if row.topic_id.is_empty() {
            problems.push("topic_id 为空");
        }
        if row.subtopic_name.is_empty() {
            problems.push("subtopic_name 为空");
        }
        if row.subtopic_minutes < 0 {
            problems.push("subtopic_minutes 缺失或非数值");
        }
        if problems.is_empty() {
            None
        } else {
            Some(RowViolation {
                row_number,
                message: problems.join("; "),
            })
        }
    }

    // ==========================================
    // 落库
    // ==========================================

    /// 行集合 → 去重记录 → 分批写入
    async fn import_rows(
        &self,
        file_name: String,
        rows: Vec<(usize, CatalogRow)>,
    ) -> Result<ImportResult, ImportError> {
        let batch_id = Uuid::new_v4().to_string();
        let total_rows = rows.len();
        info!(batch_id = %batch_id, total_rows, "开始导入课程目录");

        // 逐行校验; 合法行按首次出现去重出章/主题, 子主题保持文件序
        let mut violations: Vec<RowViolation> = Vec::new();
        let mut chapters: BTreeMap<String, ChapterRecord> = BTreeMap::new();
        let mut topics: BTreeMap<String, TopicRecord> = BTreeMap::new();
        let mut subtopics: Vec<SubtopicRecord> = Vec::new();
        let mut imported_rows = 0usize;

        for (row_number, row) in rows {
            if let Some(v) = Self::validate_row(row_number, &row) {
                warn!(row_number = v.row_number, message = %v.message, "行校验失败, 跳过");
                violations.push(v);
                continue;
            }
            chapters.entry(row.chapter_id.clone()).or_insert_with(|| ChapterRecord {
                chapter_id: row.chapter_id.clone(),
                section: row.section.clone(),
                chapter_name: row.chapter_name.clone(),
                category: row.chapter_category.clone(),
                chapter_rank: row.chapter_rank,
            });
            topics.entry(row.topic_id.clone()).or_insert_with(|| TopicRecord {
                topic_id: row.topic_id.clone(),
                chapter_id: row.chapter_id.clone(),
                topic_name: row.topic_name.clone(),
                category: row.topic_category.clone(),
                topic_order: row.topic_order,
                est_minutes: row.est_minutes,
            });
            let subtopic_id = if row.subtopic_id.is_empty() {
                // 缺失外部ID时以主题内行序合成
                format!("{}::{}", row.topic_id, subtopics.len())
            } else {
                row.subtopic_id.clone()
            };
            subtopics.push(SubtopicRecord {
                subtopic_id,
                topic_id: row.topic_id.clone(),
                subtopic_name: row.subtopic_name.clone(),
                subtopic_order: row.subtopic_order,
                minutes: row.subtopic_minutes,
            });
            imported_rows += 1;
        }

        let chapters: Vec<ChapterRecord> = chapters.into_values().collect();
        let topics: Vec<TopicRecord> = topics.into_values().collect();

        // 全量重导入: 先清空旧目录
        self.import_repo.clear_catalog().await?;

        // 分批落库, 每批独立重试
        let batch_size = self
            .config
            .get_usize(config_keys::IMPORT_BATCH_SIZE)
            .unwrap_or(100)
            .max(1);
        let max_retries = self
            .config
            .get_i64(config_keys::IMPORT_MAX_RETRIES)
            .unwrap_or(3)
            .max(0) as u32;

        self.save_with_retry(&chapters, &topics, &[], max_retries).await?;
        for chunk in subtopics.chunks(batch_size) {
            self.save_with_retry(&[], &[], chunk, max_retries).await?;
        }

        let status = if violations.is_empty() { "DONE" } else { "PARTIAL" };
        let record = ImportBatchRecord {
            batch_id: batch_id.clone(),
            file_name,
            total_rows,
            imported_rows,
            skipped_rows: violations.len(),
            status: status.to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        };
        self.import_repo.record_batch(&record).await?;

        info!(
            batch_id = %batch_id,
            imported = imported_rows,
            skipped = violations.len(),
            chapters = chapters.len(),
            topics = topics.len(),
            subtopics = subtopics.len(),
            "目录导入完成"
        );
        Ok(ImportResult {
            batch_id,
            total_rows,
            imported_rows,
            skipped_rows: violations.len(),
            chapters: chapters.len(),
            topics: topics.len(),
            subtopics: subtopics.len(),
            violations,
        })
    }

    /// 单批写入, 指数退避重试 (100ms, 200ms, 400ms, ...)
    async fn save_with_retry(
        &self,
        chapters: &[ChapterRecord],
        topics: &[TopicRecord],
        subtopics: &[SubtopicRecord],
        max_retries: u32,
    ) -> Result<(), ImportError> {
        let mut attempt = 0u32;
        loop {
            match self
                .import_repo
                .save_catalog_batch(chapters, topics, subtopics)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if attempt < max_retries => {
                    let backoff = Duration::from_millis(100 * (1 << attempt));
                    warn!(
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "批次写入失败, 退避后重试"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(error = %e, "批次写入重试耗尽");
                    return Err(ImportError::PersistFailed {
                        retries: max_retries,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}
