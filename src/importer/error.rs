// ==========================================
// 备考学习计划排程系统 - 导入错误
// ==========================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("不支持的文件格式: {0} (仅支持 .csv / .xlsx / .xls)")]
    UnsupportedFormat(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("缺少必需表头: {0}")]
    MissingHeader(String),

    #[error("持久化失败 (重试 {retries} 次后放弃): {message}")]
    PersistFailed { retries: u32, message: String },

    #[error("仓储错误: {0}")]
    Repository(#[from] crate::repository::error::RepositoryError),
}
