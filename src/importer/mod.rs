// ==========================================
// 备考学习计划排程系统 - 导入层
// ==========================================

pub mod curriculum_importer;
pub mod error;

pub use curriculum_importer::{CurriculumImporter, ImportResult, RowViolation};
pub use error::ImportError;
