// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化 + 目录/档案测试数据生成
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use study_plan_aps::db;
use study_plan_aps::domain::curriculum::{ChapterRecord, SubtopicRecord, TopicRecord};
use study_plan_aps::domain::profile::PlanProfile;
use study_plan_aps::repository::catalog_repo::CatalogRepository;
use study_plan_aps::repository::profile_repo::PlanProfileRepository;

/// 创建临时测试数据库并初始化 schema
///
/// 返回的 NamedTempFile 必须保持存活, 否则数据库文件被删除
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享测试连接 (已配置 PRAGMA)
pub fn open_shared_connection(db_path: &str) -> Arc<Mutex<Connection>> {
    let conn = db::open_sqlite_connection(db_path).expect("无法打开测试数据库");
    Arc::new(Mutex::new(conn))
}

/// 2026-08-31, 周一; 周相关测试的统一基准日
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 31).unwrap()
}

pub fn make_profile(daily_minutes: i64) -> PlanProfile {
    PlanProfile::new(monday(), daily_minutes)
}

pub fn save_profile(conn: &Arc<Mutex<Connection>>, profile: &PlanProfile) {
    PlanProfileRepository::from_connection(conn.clone())
        .save(profile)
        .expect("保存测试档案失败");
}

// ==========================================
// 目录测试数据
// ==========================================

pub fn chapter(id: &str, section: &str, name: &str, category: Option<&str>) -> ChapterRecord {
    ChapterRecord {
        chapter_id: id.to_string(),
        section: section.to_string(),
        chapter_name: name.to_string(),
        category: category.map(|c| c.to_string()),
        chapter_rank: None,
    }
}

pub fn topic(id: &str, chapter_id: &str, name: &str, order: Option<i32>) -> TopicRecord {
    TopicRecord {
        topic_id: id.to_string(),
        chapter_id: chapter_id.to_string(),
        topic_name: name.to_string(),
        category: None,
        topic_order: order,
        est_minutes: None,
    }
}

pub fn subtopic(id: &str, topic_id: &str, name: &str, minutes: i64) -> SubtopicRecord {
    SubtopicRecord {
        subtopic_id: id.to_string(),
        topic_id: topic_id.to_string(),
        subtopic_name: name.to_string(),
        subtopic_order: None,
        minutes,
    }
}

/// 种一个两科目的小目录:
/// - 数学/C1(HIGH): T1 (20/30/40 分钟), T2 (60 分钟)
/// - 英语/C2(LOW):  T3 (25/35 分钟)
pub fn seed_small_catalog(conn: &Arc<Mutex<Connection>>) {
    let repo = CatalogRepository::from_connection(conn.clone());
    let chapters = vec![
        chapter("C1", "数学", "函数与极限", Some("HIGH")),
        chapter("C2", "英语", "阅读理解", Some("LOW")),
    ];
    let topics = vec![
        topic("T1", "C1", "数列极限", Some(1)),
        topic("T2", "C1", "函数连续性", Some(2)),
        topic("T3", "C2", "长难句", Some(1)),
    ];
    let subtopics = vec![
        subtopic("S1", "T1", "定义与性质", 20),
        subtopic("S2", "T1", "夹逼定理", 30),
        subtopic("S3", "T1", "单调有界", 40),
        subtopic("S4", "T2", "间断点分类", 60),
        subtopic("S5", "T3", "定语从句", 25),
        subtopic("S6", "T3", "状语从句", 35),
    ];
    repo.save_batch(&chapters, &topics, &subtopics)
        .expect("写入测试目录失败");
}
