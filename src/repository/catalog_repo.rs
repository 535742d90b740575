// ==========================================
// 备考学习计划排程系统 - 课程目录数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 目录在排程期只读, 仅重建/导入时写入
// ==========================================

use crate::domain::curriculum::{ChapterRecord, CurriculumIndex, SubtopicRecord, TopicRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// CatalogRepository - 目录仓储
// ==========================================

/// 课程目录仓储
/// 职责: 管理 curriculum_chapter / curriculum_topic / curriculum_subtopic 三表
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取全部章记录
    pub fn list_chapters(&self) -> RepositoryResult<Vec<ChapterRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT chapter_id, section, chapter_name, category, chapter_rank
             FROM curriculum_chapter ORDER BY chapter_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ChapterRecord {
                chapter_id: row.get(0)?,
                section: row.get(1)?,
                chapter_name: row.get(2)?,
                category: row.get(3)?,
                chapter_rank: row.get(4)?,
            })
        })?;
        let mut chapters = Vec::new();
        for r in rows {
            chapters.push(r?);
        }
        Ok(chapters)
    }

    /// 读取全部主题记录
    pub fn list_topics(&self) -> RepositoryResult<Vec<TopicRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT topic_id, chapter_id, topic_name, category, topic_order, est_minutes
             FROM curriculum_topic ORDER BY topic_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TopicRecord {
                topic_id: row.get(0)?,
                chapter_id: row.get(1)?,
                topic_name: row.get(2)?,
                category: row.get(3)?,
                topic_order: row.get(4)?,
                est_minutes: row.get(5)?,
            })
        })?;
        let mut topics = Vec::new();
        for r in rows {
            topics.push(r?);
        }
        Ok(topics)
    }

    /// 读取全部子主题记录
    pub fn list_subtopics(&self) -> RepositoryResult<Vec<SubtopicRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT subtopic_id, topic_id, subtopic_name, subtopic_order, minutes
             FROM curriculum_subtopic ORDER BY subtopic_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SubtopicRecord {
                subtopic_id: row.get(0)?,
                topic_id: row.get(1)?,
                subtopic_name: row.get(2)?,
                subtopic_order: row.get(3)?,
                minutes: row.get(4)?,
            })
        })?;
        let mut subtopics = Vec::new();
        for r in rows {
            subtopics.push(r?);
        }
        Ok(subtopics)
    }

    /// 加载归一化目录索引 (QueueCompiler 的输入)
    pub fn load_index(&self) -> RepositoryResult<CurriculumIndex> {
        let chapters = self.list_chapters()?;
        let topics = self.list_topics()?;
        let subtopics = self.list_subtopics()?;
        Ok(CurriculumIndex::from_records(chapters, topics, subtopics))
    }

    /// 批量写入一批目录记录 (单事务)
    ///
    /// upsert 语义: 同ID覆盖, 供导入层分批调用
    pub fn save_batch(
        &self,
        chapters: &[ChapterRecord],
        topics: &[TopicRecord],
        subtopics: &[SubtopicRecord],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for c in chapters {
            tx.execute(
                "INSERT INTO curriculum_chapter (chapter_id, section, chapter_name, category, chapter_rank)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(chapter_id) DO UPDATE SET
                     section = excluded.section,
                     chapter_name = excluded.chapter_name,
                     category = excluded.category,
                     chapter_rank = excluded.chapter_rank",
                params![c.chapter_id, c.section, c.chapter_name, c.category, c.chapter_rank],
            )?;
        }
        for t in topics {
            tx.execute(
                "INSERT INTO curriculum_topic (topic_id, chapter_id, topic_name, category, topic_order, est_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(topic_id) DO UPDATE SET
                     chapter_id = excluded.chapter_id,
                     topic_name = excluded.topic_name,
                     category = excluded.category,
                     topic_order = excluded.topic_order,
                     est_minutes = excluded.est_minutes",
                params![t.topic_id, t.chapter_id, t.topic_name, t.category, t.topic_order, t.est_minutes],
            )?;
        }
        for s in subtopics {
            tx.execute(
                "INSERT INTO curriculum_subtopic (subtopic_id, topic_id, subtopic_name, subtopic_order, minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(subtopic_id) DO UPDATE SET
                     topic_id = excluded.topic_id,
                     subtopic_name = excluded.subtopic_name,
                     subtopic_order = excluded.subtopic_order,
                     minutes = excluded.minutes",
                params![s.subtopic_id, s.topic_id, s.subtopic_name, s.subtopic_order, s.minutes],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// 清空目录 (全量重导入前调用)
    pub fn delete_all(&self) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM curriculum_subtopic", [])?;
        tx.execute("DELETE FROM curriculum_topic", [])?;
        let n = tx.execute("DELETE FROM curriculum_chapter", [])?;
        tx.commit()?;
        Ok(n)
    }
}
