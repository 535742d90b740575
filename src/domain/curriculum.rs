// ==========================================
// 备考学习计划排程系统 - 课程目录领域模型
// ==========================================
// 职责: 原始目录记录(章/主题/子主题) + 归一化目录索引
// 红线: 领域层不触数据库，归一化为纯函数
// ==========================================

use crate::domain::types::PriorityBand;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// ChapterRecord - 章记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub chapter_id: String,         // 章ID
    pub section: String,            // 所属科目/部分
    pub chapter_name: String,       // 章名称
    pub category: Option<String>,   // 分类 (HIGH/MEDIUM/LOW)
    pub chapter_rank: Option<i32>,  // 显式章序
}

impl ChapterRecord {
    /// 章排序键: 显式 chapter_rank → 数值化ID → 章名称
    ///
    /// 数值化ID失败时落到 i64::MAX，保证可比较
    pub fn order_key(&self) -> (i64, String) {
        let rank = match self.chapter_rank {
            Some(r) => i64::from(r),
            None => self
                .chapter_id
                .trim_start_matches(|c: char| !c.is_ascii_digit())
                .parse::<i64>()
                .unwrap_or(i64::MAX),
        };
        (rank, self.chapter_name.clone())
    }
}

// ==========================================
// TopicRecord - 主题记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRecord {
    pub topic_id: String,            // 主题ID
    pub chapter_id: String,          // 所属章
    pub topic_name: String,          // 主题名称
    pub category: Option<String>,    // 分类 (优先带回退来源)
    pub topic_order: Option<i32>,    // 显式主题序
    pub est_minutes: Option<i64>,    // 估计时长(分钟), 无子主题时用于合成
}

impl TopicRecord {
    /// 是否为"导论"主题 (章内永远排第一)
    pub fn is_introduction(&self) -> bool {
        self.topic_order == Some(1)
            || self.topic_name.trim().eq_ignore_ascii_case("introduction")
            || self.topic_name.trim() == "导论"
    }
}

// ==========================================
// SubtopicRecord - 子主题记录
// ==========================================
// 子主题是不可分割的排程单元
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtopicRecord {
    pub subtopic_id: String,          // 子主题ID (外部ID)
    pub topic_id: String,             // 所属主题
    pub subtopic_name: String,        // 子主题名称
    pub subtopic_order: Option<i32>,  // 显式子主题序
    pub minutes: i64,                 // 时长(分钟)
}

impl SubtopicRecord {
    /// 子主题排序键: 显式序 → 数值化ID → 名称
    pub fn order_key(&self) -> (i64, i64, String) {
        let explicit = match self.subtopic_order {
            Some(o) => i64::from(o),
            None => i64::MAX,
        };
        let numeric_id = self
            .subtopic_id
            .trim_start_matches(|c: char| !c.is_ascii_digit())
            .parse::<i64>()
            .unwrap_or(i64::MAX);
        (explicit, numeric_id, self.subtopic_name.clone())
    }
}

// ==========================================
// CatalogTopic - 归一化后的可排程主题
// ==========================================
/// 一个主题连同其章上下文与已派生的优先带
///
/// 优先带派生规则: 章分类优先，缺失时回退主题自身分类
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogTopic {
    pub section: String,
    pub chapter: ChapterRecord,
    pub topic: TopicRecord,
    pub subtopics: Vec<SubtopicRecord>, // 已按 order_key 排序
    pub band: PriorityBand,
}

impl CatalogTopic {
    /// 主题总时长: 子主题之和, 无子主题时取估计时长
    pub fn total_minutes(&self) -> i64 {
        if self.subtopics.is_empty() {
            self.topic.est_minutes.unwrap_or(0).max(0)
        } else {
            self.subtopics.iter().map(|s| s.minutes.max(0)).sum()
        }
    }
}

// ==========================================
// CurriculumIndex - 目录索引
// ==========================================
/// 归一化后的完整目录
///
/// 由原始记录构建，不触数据库，QueueCompiler 的唯一输入
#[derive(Debug, Clone, Default)]
pub struct CurriculumIndex {
    pub topics: Vec<CatalogTopic>,
}

impl CurriculumIndex {
    /// 从原始记录归一化构建目录索引
    ///
    /// # 规则
    /// - 丢弃章不存在的孤儿主题（记录 warn 日志）
    /// - 子主题按 (显式序, 数值ID, 名称) 排序
    /// - 优先带: 章分类优先，回退主题分类
    pub fn from_records(
        chapters: Vec<ChapterRecord>,
        topics: Vec<TopicRecord>,
        subtopics: Vec<SubtopicRecord>,
    ) -> Self {
        let chapter_map: HashMap<String, ChapterRecord> = chapters
            .into_iter()
            .map(|c| (c.chapter_id.clone(), c))
            .collect();

        let mut subtopic_map: HashMap<String, Vec<SubtopicRecord>> = HashMap::new();
        for st in subtopics {
            subtopic_map.entry(st.topic_id.clone()).or_default().push(st);
        }

        let mut catalog = Vec::new();
        for topic in topics {
            let chapter = match chapter_map.get(&topic.chapter_id) {
                Some(c) => c.clone(),
                None => {
                    tracing::warn!(
                        topic_id = %topic.topic_id,
                        chapter_id = %topic.chapter_id,
                        "主题引用了不存在的章，已跳过"
                    );
                    continue;
                }
            };

            let mut subs = subtopic_map.remove(&topic.topic_id).unwrap_or_default();
            subs.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

            let band = match chapter.category.as_deref() {
                Some(c) if !c.trim().is_empty() => PriorityBand::from_category(Some(c)),
                _ => PriorityBand::from_category(topic.category.as_deref()),
            };

            catalog.push(CatalogTopic {
                section: chapter.section.clone(),
                chapter,
                topic,
                subtopics: subs,
                band,
            });
        }

        Self { topics: catalog }
    }

    /// 目录包含的全部科目 (去重)
    pub fn sections(&self) -> Vec<String> {
        let mut sections: Vec<String> = self.topics.iter().map(|t| t.section.clone()).collect();
        sections.sort();
        sections.dedup();
        sections
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(id: &str, section: &str, category: Option<&str>) -> ChapterRecord {
        ChapterRecord {
            chapter_id: id.to_string(),
            section: section.to_string(),
            chapter_name: format!("章{}", id),
            category: category.map(|c| c.to_string()),
            chapter_rank: None,
        }
    }

    fn topic(id: &str, chapter_id: &str, category: Option<&str>) -> TopicRecord {
        TopicRecord {
            topic_id: id.to_string(),
            chapter_id: chapter_id.to_string(),
            topic_name: format!("主题{}", id),
            category: category.map(|c| c.to_string()),
            topic_order: None,
            est_minutes: Some(60),
        }
    }

    #[test]
    fn test_band_prefers_chapter_category() {
        let idx = CurriculumIndex::from_records(
            vec![chapter("C1", "数学", Some("HIGH"))],
            vec![topic("T1", "C1", Some("LOW"))],
            vec![],
        );
        assert_eq!(idx.topics[0].band, PriorityBand::High);
    }

    #[test]
    fn test_band_falls_back_to_topic_category() {
        let idx = CurriculumIndex::from_records(
            vec![chapter("C1", "数学", None)],
            vec![topic("T1", "C1", Some("MEDIUM"))],
            vec![],
        );
        assert_eq!(idx.topics[0].band, PriorityBand::Medium);
    }

    #[test]
    fn test_orphan_topic_dropped() {
        let idx = CurriculumIndex::from_records(
            vec![chapter("C1", "数学", None)],
            vec![topic("T1", "C1", None), topic("T2", "MISSING", None)],
            vec![],
        );
        assert_eq!(idx.topics.len(), 1);
    }

    #[test]
    fn test_subtopics_sorted_by_explicit_order_then_id_then_name() {
        let st = |id: &str, order: Option<i32>| SubtopicRecord {
            subtopic_id: id.to_string(),
            topic_id: "T1".to_string(),
            subtopic_name: format!("子{}", id),
            subtopic_order: order,
            minutes: 10,
        };
        let idx = CurriculumIndex::from_records(
            vec![chapter("C1", "数学", None)],
            vec![topic("T1", "C1", None)],
            vec![st("S3", None), st("S2", Some(1)), st("S1", Some(2))],
        );
        let ids: Vec<&str> = idx.topics[0]
            .subtopics
            .iter()
            .map(|s| s.subtopic_id.as_str())
            .collect();
        assert_eq!(ids, vec!["S2", "S1", "S3"]);
    }
}
