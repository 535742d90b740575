// ==========================================
// 主队列仓储集成测试
// ==========================================
// 覆盖: 批量重建后条目集与重建前无残留 / max_sequence_key 查询
// ==========================================

mod test_helpers;

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use study_plan_aps::domain::queue::{QueueEntry, SubtopicUnit};
use study_plan_aps::domain::types::{QueueState, SequenceKey, SubtopicStatus};
use study_plan_aps::repository::queue_repo::MasterQueueRepository;
use test_helpers::{create_test_db, open_shared_connection};

fn entry(key: i64, topic_id: &str, minutes: i64) -> QueueEntry {
    QueueEntry {
        sequence_key: SequenceKey(key),
        section: "数学".to_string(),
        chapter_id: "C1".to_string(),
        chapter_name: "函数".to_string(),
        topic_id: topic_id.to_string(),
        topic_name: format!("主题{}", topic_id),
        subtopics: vec![SubtopicUnit {
            index: 0,
            external_id: format!("{}::0", topic_id),
            name: "子主题".to_string(),
            minutes,
            status: SubtopicStatus::Pending,
        }],
        scheduled_dates: BTreeMap::new(),
        scheduled_minutes: 0,
        completed_indices: Vec::new(),
        completed_minutes: 0,
        queue_state: QueueState::Queued,
        updated_at: Utc::now().naive_utc(),
    }
}

#[test]
fn test_batched_rebuild_leaves_exactly_new_entries() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared_connection(&db_path);
    let repo = MasterQueueRepository::from_connection(Arc::clone(&conn));

    let old: Vec<QueueEntry> = (1..=5).map(|k| entry(k, &format!("OLD{}", k), 30)).collect();
    repo.insert_batched(&old, 2).unwrap();
    assert_eq!(repo.count().unwrap(), 5);

    // 批次小于总量, 走多轮删除路径
    let deleted = repo.delete_all_batched(2).unwrap();
    assert_eq!(deleted, 5);
    assert_eq!(repo.count().unwrap(), 0);

    let new: Vec<QueueEntry> = (1..=3).map(|k| entry(k, &format!("NEW{}", k), 45)).collect();
    repo.insert_batched(&new, 2).unwrap();

    let all = repo.list_all_ordered().unwrap();
    let topic_ids: Vec<&str> = all.iter().map(|e| e.topic_id.as_str()).collect();
    assert_eq!(topic_ids, vec!["NEW1", "NEW2", "NEW3"]);
    let keys: Vec<i64> = all.iter().map(|e| e.sequence_key.0).collect();
    assert_eq!(keys, vec![1, 2, 3]);
}

#[test]
fn test_max_sequence_key_tracks_inserts() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared_connection(&db_path);
    let repo = MasterQueueRepository::from_connection(Arc::clone(&conn));

    assert_eq!(repo.max_sequence_key().unwrap(), None);

    repo.insert_batched(&[entry(1, "T1", 30), entry(7, "T7", 30)], 10)
        .unwrap();
    assert_eq!(repo.max_sequence_key().unwrap(), Some(SequenceKey(7)));
}

#[test]
fn test_update_missing_entry_reports_not_found() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared_connection(&db_path);
    let repo = MasterQueueRepository::from_connection(Arc::clone(&conn));

    let phantom = entry(99, "NONE", 10);
    let err = repo.update_entry(&phantom).unwrap_err();
    assert!(err.to_string().contains("99"));
}
