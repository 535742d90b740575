// ==========================================
// 备考学习计划排程系统 - 队列编译引擎
// ==========================================
// 职责: 将课程目录确定性线性化为主队列
// 红线: 编译是 (目录快照, 档案) 的纯函数, 同输入必同序
// ==========================================
// 顺序: 优先带 → 有效科目序 → 章序 → 主题序
// 持久化: 有界批次删除旧队列 + 有界批次写入新队列 + 摘要记录
// ==========================================

use crate::config::{config_keys, ConfigManager};
use crate::domain::curriculum::{CatalogTopic, CurriculumIndex};
use crate::domain::profile::PlanProfile;
use crate::domain::queue::{QueueEntry, SubtopicUnit};
use crate::domain::types::{PriorityBand, QueueState, SequenceKey, SubtopicStatus};
use crate::engine::events::{OptionalEventPublisher, SessionEvent, SessionEventPublisher};
use crate::repository::catalog_repo::CatalogRepository;
use crate::repository::error::RepositoryResult;
use crate::repository::queue_repo::{MasterQueueRepository, QueueMetaRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

// ==========================================
// QueueBuildSummary - 构建结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueBuildSummary {
    pub total_topics: i64,     // 主题总数
    pub total_minutes: i64,    // 总分钟
    pub rebuilt: bool,         // 本次是否实际重建 (false = 非强制调用命中已有队列)
}

// ==========================================
// QueueCompiler - 队列编译引擎
// ==========================================
pub struct QueueCompiler {
    catalog_repo: Arc<CatalogRepository>,
    queue_repo: Arc<MasterQueueRepository>,
    config: Arc<ConfigManager>,
    event_publisher: OptionalEventPublisher,
}

impl QueueCompiler {
    pub fn new(
        catalog_repo: Arc<CatalogRepository>,
        queue_repo: Arc<MasterQueueRepository>,
        config: Arc<ConfigManager>,
        event_publisher: Option<Arc<dyn SessionEventPublisher>>,
    ) -> Self {
        let event_publisher = match event_publisher {
            Some(p) => OptionalEventPublisher::with_publisher(p),
            None => OptionalEventPublisher::none(),
        };
        Self {
            catalog_repo,
            queue_repo,
            config,
            event_publisher,
        }
    }

    // ==========================================
    // 纯编译 (无持久化)
    // ==========================================

    /// 将目录索引线性化为队列条目序列
    ///
    /// 确定性保证: 所有层级排序键完整, 无未定义的相对次序
    pub fn compile(index: &CurriculumIndex, profile: &PlanProfile) -> Vec<QueueEntry> {
        // 1. 可选的 HIGH 限定
        let bands: &[PriorityBand] = if profile.restrict_high_priority_only {
            &[PriorityBand::High]
        } else {
            &PriorityBand::BAND_ORDER
        };

        // 2. 有效科目顺序
        let catalog_sections = index.sections();
        let section_order = profile.effective_section_order(&catalog_sections);

        // 3. 逐带、逐科目、逐章、逐主题输出
        let mut ordered: Vec<&CatalogTopic> = Vec::new();
        for band in bands {
            let mut in_band: Vec<&CatalogTopic> = index
                .topics
                .iter()
                .filter(|t| t.band == *band && !profile.disabled_sections.contains(&t.section))
                .collect();

            for section in &section_order {
                let section_topics: Vec<&CatalogTopic> = in_band
                    .iter()
                    .copied()
                    .filter(|t| &t.section == section)
                    .collect();
                ordered.extend(Self::order_within_section(section_topics));
            }

            // 带内存在但不在有效科目序中的科目 (配置不一致的边界情形):
            // 按科目字母序追加
            in_band.retain(|t| !section_order.contains(&t.section));
            let mut stray_sections: Vec<String> =
                in_band.iter().map(|t| t.section.clone()).collect();
            stray_sections.sort();
            stray_sections.dedup();
            for section in &stray_sections {
                let section_topics: Vec<&CatalogTopic> = in_band
                    .iter()
                    .copied()
                    .filter(|t| &t.section == section)
                    .collect();
                ordered.extend(Self::order_within_section(section_topics));
            }
        }

        // 4. 合成队列条目, 序列键从 1 起单调递增
        let mut entries = Vec::with_capacity(ordered.len());
        let mut key = SequenceKey::FIRST;
        for topic in ordered {
            entries.push(Self::synthesize_entry(topic, key));
            key = key.next();
        }
        entries
    }

    /// 科目内排序: 章序 → 主题序
    fn order_within_section(mut topics: Vec<&CatalogTopic>) -> Vec<&CatalogTopic> {
        // 章: 显式 rank → 数值ID → 章名
        // 主题: 导论优先 → 自身分类秩 → 显式序 → 名称
        topics.sort_by(|a, b| {
            a.chapter
                .order_key()
                .cmp(&b.chapter.order_key())
                .then_with(|| Self::topic_order_key(a).cmp(&Self::topic_order_key(b)))
        });
        topics
    }

    fn topic_order_key(t: &CatalogTopic) -> (u8, u8, i64, String) {
        let intro = if t.topic.is_introduction() { 0 } else { 1 };
        let own_rank = PriorityBand::from_category(t.topic.category.as_deref()).rank();
        let explicit = t.topic.topic_order.map(i64::from).unwrap_or(i64::MAX);
        (intro, own_rank, explicit, t.topic.topic_name.clone())
    }

    /// 合成单个队列条目
    ///
    /// 无子主题但有正时长的主题合成单个子主题, 保证子主题粒度可排
    fn synthesize_entry(topic: &CatalogTopic, key: SequenceKey) -> QueueEntry {
        let subtopics: Vec<SubtopicUnit> = if topic.subtopics.is_empty() {
            let est = topic.topic.est_minutes.unwrap_or(0);
            if est > 0 {
                vec![SubtopicUnit {
                    index: 0,
                    external_id: format!("{}::self", topic.topic.topic_id),
                    name: topic.topic.topic_name.clone(),
                    minutes: est,
                    status: SubtopicStatus::Pending,
                }]
            } else {
                Vec::new()
            }
        } else {
            topic
                .subtopics
                .iter()
                .enumerate()
                .map(|(i, st)| SubtopicUnit {
                    index: i as u32,
                    external_id: st.subtopic_id.clone(),
                    name: st.subtopic_name.clone(),
                    minutes: st.minutes,
                    status: SubtopicStatus::Pending,
                })
                .collect()
        };

        QueueEntry {
            sequence_key: key,
            section: topic.section.clone(),
            chapter_id: topic.chapter.chapter_id.clone(),
            chapter_name: topic.chapter.chapter_name.clone(),
            topic_id: topic.topic.topic_id.clone(),
            topic_name: topic.topic.topic_name.clone(),
            subtopics,
            scheduled_dates: BTreeMap::new(),
            scheduled_minutes: 0,
            completed_indices: Vec::new(),
            completed_minutes: 0,
            queue_state: QueueState::Queued,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    // ==========================================
    // 构建与持久化
    // ==========================================

    /// 构建主队列
    ///
    /// # 语义
    /// - 非强制且已有非空队列: 无操作, 返回既有摘要
    /// - 强制: 先批量删除旧队列, 再批量写入新队列 (批次各自成事务,
    ///   非端到端原子; 建档期操作, 不在运行时热路径)
    #[instrument(skip(self, profile), fields(force_rebuild))]
    pub fn build_master_queue(
        &self,
        profile: &PlanProfile,
        force_rebuild: bool,
    ) -> RepositoryResult<QueueBuildSummary> {
        let existing = self.queue_repo.count()?;
        if existing > 0 && !force_rebuild {
            tracing::info!(existing, "{}", crate::i18n::t("queue.already_built"));
            let meta = self.queue_repo.read_meta()?;
            return Ok(QueueBuildSummary {
                total_topics: meta.as_ref().map(|m| m.total_topics).unwrap_or(existing as i64),
                total_minutes: meta.map(|m| m.total_minutes).unwrap_or(0),
                rebuilt: false,
            });
        }

        let index = self.catalog_repo.load_index()?;
        let entries = Self::compile(&index, profile);

        let batch_size = self
            .config
            .get_usize(config_keys::QUEUE_WRITE_BATCH_SIZE)
            .unwrap_or(crate::repository::QUEUE_WRITE_BATCH_SIZE);

        let deleted = self.queue_repo.delete_all_batched(batch_size)?;
        self.queue_repo.insert_batched(&entries, batch_size)?;

        // 摘要记录
        let total_minutes: i64 = entries.iter().map(|e| e.total_minutes()).sum();
        let mut section_totals: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for e in &entries {
            let slot = section_totals.entry(e.section.clone()).or_insert((0, 0));
            slot.0 += 1;
            slot.1 += e.total_minutes();
        }
        let meta = QueueMetaRecord {
            build_id: Uuid::new_v4().to_string(),
            total_topics: entries.len() as i64,
            total_minutes,
            section_totals,
            built_at: chrono::Utc::now().naive_utc(),
        };
        self.queue_repo.save_meta(&meta)?;

        tracing::info!(
            deleted,
            total_topics = entries.len(),
            total_minutes,
            "主队列重建完成"
        );
        self.event_publisher
            .publish(SessionEvent::queue_rebuilt(total_minutes));

        Ok(QueueBuildSummary {
            total_topics: entries.len() as i64,
            total_minutes,
            rebuilt: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::curriculum::{ChapterRecord, SubtopicRecord, TopicRecord};
    use chrono::NaiveDate;

    fn chapter(id: &str, section: &str, category: Option<&str>, rank: Option<i32>) -> ChapterRecord {
        ChapterRecord {
            chapter_id: id.to_string(),
            section: section.to_string(),
            chapter_name: format!("章{}", id),
            category: category.map(String::from),
            chapter_rank: rank,
        }
    }

    fn topic(id: &str, chapter_id: &str, order: Option<i32>, minutes: Option<i64>) -> TopicRecord {
        TopicRecord {
            topic_id: id.to_string(),
            chapter_id: chapter_id.to_string(),
            topic_name: format!("主题{}", id),
            category: None,
            topic_order: order,
            est_minutes: minutes,
        }
    }

    fn subtopic(id: &str, topic_id: &str, order: i32, minutes: i64) -> SubtopicRecord {
        SubtopicRecord {
            subtopic_id: id.to_string(),
            topic_id: topic_id.to_string(),
            subtopic_name: format!("子{}", id),
            subtopic_order: Some(order),
            minutes,
        }
    }

    fn profile() -> PlanProfile {
        PlanProfile::new(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(), 120)
    }

    #[test]
    fn test_band_interleaving_precedes_section_order() {
        // 数学=HIGH, 英语=MEDIUM: HIGH 带整体先于 MEDIUM 带
        let index = CurriculumIndex::from_records(
            vec![
                chapter("C1", "英语", Some("MEDIUM"), Some(1)),
                chapter("C2", "数学", Some("HIGH"), Some(1)),
            ],
            vec![topic("T1", "C1", Some(1), Some(30)), topic("T2", "C2", Some(1), Some(30))],
            vec![],
        );
        let mut p = profile();
        p.section_order = vec!["英语".into(), "数学".into()];
        let entries = QueueCompiler::compile(&index, &p);
        let ids: Vec<&str> = entries.iter().map(|e| e.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["T2", "T1"]);
    }

    #[test]
    fn test_sequence_keys_strictly_increasing_from_one() {
        let index = CurriculumIndex::from_records(
            vec![chapter("C1", "数学", Some("HIGH"), Some(1))],
            vec![
                topic("T1", "C1", Some(1), Some(30)),
                topic("T2", "C1", Some(2), Some(30)),
                topic("T3", "C1", Some(3), Some(30)),
            ],
            vec![],
        );
        let entries = QueueCompiler::compile(&index, &profile());
        let keys: Vec<i64> = entries.iter().map(|e| e.sequence_key.0).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let make_index = || {
            CurriculumIndex::from_records(
                vec![
                    chapter("C1", "数学", Some("HIGH"), None),
                    chapter("C2", "数学", Some("MEDIUM"), None),
                    chapter("C3", "英语", Some("HIGH"), Some(1)),
                ],
                vec![
                    topic("T1", "C1", None, Some(30)),
                    topic("T2", "C1", Some(2), Some(40)),
                    topic("T3", "C2", Some(1), Some(50)),
                    topic("T4", "C3", Some(1), Some(60)),
                ],
                vec![subtopic("S1", "T1", 2, 20), subtopic("S2", "T1", 1, 10)],
            )
        };
        let a = QueueCompiler::compile(&make_index(), &profile());
        let b = QueueCompiler::compile(&make_index(), &profile());
        let ka: Vec<(i64, String)> = a.iter().map(|e| (e.sequence_key.0, e.topic_id.clone())).collect();
        let kb: Vec<(i64, String)> = b.iter().map(|e| (e.sequence_key.0, e.topic_id.clone())).collect();
        assert_eq!(ka, kb);
    }

    #[test]
    fn test_restrict_high_priority_drops_other_bands() {
        // 章与主题分类均非 HIGH 的主题不产生条目
        let index = CurriculumIndex::from_records(
            vec![
                chapter("C1", "数学", Some("HIGH"), Some(1)),
                chapter("C2", "数学", Some("MEDIUM"), Some(2)),
                chapter("C3", "数学", None, Some(3)),
            ],
            vec![
                topic("T1", "C1", Some(1), Some(30)),
                topic("T2", "C2", Some(1), Some(30)),
                topic("T3", "C3", Some(1), Some(30)),
            ],
            vec![],
        );
        let mut p = profile();
        p.restrict_high_priority_only = true;
        let entries = QueueCompiler::compile(&index, &p);
        let ids: Vec<&str> = entries.iter().map(|e| e.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["T1"]);
    }

    #[test]
    fn test_introduction_topic_first_in_chapter() {
        let mut intro = topic("T9", "C1", None, Some(30));
        intro.topic_name = "Introduction".to_string();
        let index = CurriculumIndex::from_records(
            vec![chapter("C1", "数学", Some("HIGH"), Some(1))],
            vec![topic("T1", "C1", Some(2), Some(30)), intro],
            vec![],
        );
        let entries = QueueCompiler::compile(&index, &profile());
        assert_eq!(entries[0].topic_id, "T9");
    }

    #[test]
    fn test_synthetic_subtopic_for_bare_topic() {
        let index = CurriculumIndex::from_records(
            vec![chapter("C1", "数学", Some("HIGH"), Some(1))],
            vec![topic("T1", "C1", Some(1), Some(45))],
            vec![],
        );
        let entries = QueueCompiler::compile(&index, &profile());
        assert_eq!(entries[0].subtopics.len(), 1);
        assert_eq!(entries[0].subtopics[0].minutes, 45);
        assert_eq!(entries[0].subtopics[0].index, 0);
    }

    #[test]
    fn test_disabled_section_excluded_entirely() {
        let index = CurriculumIndex::from_records(
            vec![
                chapter("C1", "数学", Some("HIGH"), Some(1)),
                chapter("C2", "政治", Some("HIGH"), Some(1)),
            ],
            vec![topic("T1", "C1", Some(1), Some(30)), topic("T2", "C2", Some(1), Some(30))],
            vec![],
        );
        let mut p = profile();
        p.disabled_sections = vec!["政治".into()];
        let entries = QueueCompiler::compile(&index, &p);
        let ids: Vec<&str> = entries.iter().map(|e| e.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["T1"]);
    }

    #[test]
    fn test_natural_subtopics_get_stable_zero_based_indices() {
        let index = CurriculumIndex::from_records(
            vec![chapter("C1", "数学", Some("HIGH"), Some(1))],
            vec![topic("T1", "C1", Some(1), None)],
            vec![
                subtopic("S3", "T1", 3, 30),
                subtopic("S1", "T1", 1, 10),
                subtopic("S2", "T1", 2, 20),
            ],
        );
        let entries = QueueCompiler::compile(&index, &profile());
        let units = &entries[0].subtopics;
        assert_eq!(units.iter().map(|u| u.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(
            units.iter().map(|u| u.external_id.as_str()).collect::<Vec<_>>(),
            vec!["S1", "S2", "S3"]
        );
    }
}
