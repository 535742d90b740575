// ==========================================
// QueueCompiler 引擎集成测试
// ==========================================
// 测试目标: 主队列构建的持久化行为与幂等语义
// ==========================================

mod test_helpers;

use std::sync::Arc;

use study_plan_aps::config::ConfigManager;
use study_plan_aps::domain::types::{QueueState, SequenceKey};
use study_plan_aps::engine::queue_compiler::QueueCompiler;
use study_plan_aps::repository::catalog_repo::CatalogRepository;
use study_plan_aps::repository::queue_repo::MasterQueueRepository;

use test_helpers::{create_test_db, make_profile, open_shared_connection, seed_small_catalog};

fn compiler_fixture() -> (
    tempfile::NamedTempFile,
    QueueCompiler,
    Arc<MasterQueueRepository>,
) {
    let (temp, db_path) = create_test_db().unwrap();
    let conn = open_shared_connection(&db_path);
    seed_small_catalog(&conn);

    let catalog_repo = Arc::new(CatalogRepository::from_connection(conn.clone()));
    let queue_repo = Arc::new(MasterQueueRepository::from_connection(conn.clone()));
    let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
    let compiler = QueueCompiler::new(catalog_repo, queue_repo.clone(), config, None);
    (temp, compiler, queue_repo)
}

#[test]
fn test_build_persists_ordered_queue() {
    let (_temp, compiler, queue_repo) = compiler_fixture();
    let profile = make_profile(120);

    let summary = compiler.build_master_queue(&profile, true).unwrap();
    assert!(summary.rebuilt);
    assert_eq!(summary.total_topics, 3);
    assert_eq!(summary.total_minutes, 210);

    let entries = queue_repo.list_all_ordered().unwrap();
    assert_eq!(entries.len(), 3);
    // 序列键从 1 起连续升序
    let keys: Vec<i64> = entries.iter().map(|e| e.sequence_key.0).collect();
    assert_eq!(keys, vec![1, 2, 3]);
    // HIGH 优先带 (数学/C1) 先于 LOW (英语/C2)
    assert_eq!(entries[0].topic_id, "T1");
    assert_eq!(entries[1].topic_id, "T2");
    assert_eq!(entries[2].topic_id, "T3");
    assert!(entries.iter().all(|e| e.queue_state == QueueState::Queued));
}

#[test]
fn test_non_forced_build_is_noop_on_existing_queue() {
    let (_temp, compiler, queue_repo) = compiler_fixture();
    let profile = make_profile(120);
    compiler.build_master_queue(&profile, true).unwrap();

    // 人为改动一个条目, 验证非强制构建不覆盖
    let mut entry = queue_repo.find_by_key(SequenceKey(1)).unwrap().unwrap();
    entry.mark_scheduled(test_helpers::monday(), &[0]);
    queue_repo.update_entry(&entry).unwrap();

    let summary = compiler.build_master_queue(&profile, false).unwrap();
    assert!(!summary.rebuilt);
    let entry = queue_repo.find_by_key(SequenceKey(1)).unwrap().unwrap();
    assert_eq!(entry.scheduled_dates.len(), 1);
}

#[test]
fn test_forced_rebuild_replaces_queue_and_meta() {
    let (_temp, compiler, queue_repo) = compiler_fixture();
    let profile = make_profile(120);
    compiler.build_master_queue(&profile, true).unwrap();
    let first_meta = queue_repo.read_meta().unwrap().unwrap();

    compiler.build_master_queue(&profile, true).unwrap();
    let second_meta = queue_repo.read_meta().unwrap().unwrap();

    // 重建产生新批次, 内容统计不变
    assert_ne!(first_meta.build_id, second_meta.build_id);
    assert_eq!(first_meta.total_minutes, second_meta.total_minutes);
    assert_eq!(queue_repo.count().unwrap(), 3);
}

#[test]
fn test_determinism_same_input_same_queue() {
    let (_temp, compiler, queue_repo) = compiler_fixture();
    let profile = make_profile(120);

    compiler.build_master_queue(&profile, true).unwrap();
    let first: Vec<(i64, String)> = queue_repo
        .list_all_ordered()
        .unwrap()
        .iter()
        .map(|e| (e.sequence_key.0, e.topic_id.clone()))
        .collect();

    compiler.build_master_queue(&profile, true).unwrap();
    let second: Vec<(i64, String)> = queue_repo
        .list_all_ordered()
        .unwrap()
        .iter()
        .map(|e| (e.sequence_key.0, e.topic_id.clone()))
        .collect();

    assert_eq!(first, second);
}

#[test]
fn test_restrict_high_priority_drops_other_bands() {
    let (_temp, compiler, queue_repo) = compiler_fixture();
    let mut profile = make_profile(120);
    profile.restrict_high_priority_only = true;

    compiler.build_master_queue(&profile, true).unwrap();
    let entries = queue_repo.list_all_ordered().unwrap();
    // 只剩 HIGH 带的数学两个主题
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.section == "数学"));
}
