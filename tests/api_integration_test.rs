// ==========================================
// API 层端到端集成测试
// ==========================================
// 测试目标: AppState 装配后的完整使用流程
// 流程: 导入目录 → 建档 → 建队列 → 排程 → 结算 → 总览 → 重置
// ==========================================

mod test_helpers;

use std::io::Write;

use study_plan_aps::api::ApiError;
use study_plan_aps::app::AppState;
use study_plan_aps::config::config_manager::{config_keys, ConfigManager};
use study_plan_aps::domain::types::{QueueState, ScheduleOutcome, SequenceKey};

use test_helpers::{create_test_db, make_profile, monday, open_shared_connection};

const CSV: &str = "\
section,chapter_id,chapter_name,chapter_category,chapter_rank,topic_id,topic_name,topic_category,topic_order,est_minutes,subtopic_id,subtopic_name,subtopic_order,subtopic_minutes
数学,C1,函数与极限,HIGH,1,T1,数列极限,,1,,S1,定义与性质,1,20
数学,C1,函数与极限,HIGH,1,T1,数列极限,,1,,S2,夹逼定理,2,30
数学,C1,函数与极限,HIGH,1,T1,数列极限,,1,,S3,单调有界,3,40
英语,C2,阅读理解,LOW,2,T2,长难句,,1,,S4,定语从句,1,25
";

fn app_fixture() -> (tempfile::NamedTempFile, AppState) {
    let (temp, db_path) = create_test_db().unwrap();
    let state = AppState::new(db_path).unwrap();
    (temp, state)
}

#[tokio::test]
async fn test_full_lifecycle_import_build_schedule_finalize() {
    let (_temp, state) = app_fixture();

    // 1. 导入目录
    let mut csv_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    csv_file.write_all(CSV.as_bytes()).unwrap();
    csv_file.flush().unwrap();
    let import = state.plan_api.import_catalog(csv_file.path()).await.unwrap();
    assert_eq!(import.imported_rows, 4);

    // 2. 建档 + 建队列
    state.plan_api.save_profile(&make_profile(90)).unwrap();
    let summary = state.plan_api.build_master_queue(false).unwrap();
    assert!(summary.rebuilt);
    assert_eq!(summary.total_topics, 2);

    // 3. 排程: T1 (90 分钟) 恰好占满周一
    let outcome = state
        .schedule_api
        .schedule_topic_to_day(monday(), SequenceKey(1))
        .unwrap();
    assert!(outcome.is_placed());

    // 4. 结算
    let finalize = state.schedule_api.finalize_day(monday()).unwrap();
    assert_eq!(finalize.completed_minutes, 90);
    assert_eq!(finalize.topics_completed.len(), 1);

    // 5. 总览
    let stats = state.dashboard_api.get_overview_stats().unwrap();
    assert_eq!(stats.minutes_total, 115);
    assert_eq!(stats.minutes_studied, 90);
    assert_eq!(stats.topics_completed, 1);
    assert_eq!(stats.topics_total, 2);
    assert!(stats.overall_progress.unwrap() > 0.7);
    assert!(stats.projected_end_date.is_some());

    let queue = state.dashboard_api.list_queue(&[]).unwrap();
    assert_eq!(queue.len(), 2);
    let done = state.dashboard_api.list_queue(&[QueueState::Done]).unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].topic_id, "T1");

    // 6. 重置: 队列与周历清空, 目录与档案保留
    state.plan_api.reset_plan().unwrap();
    assert!(state.dashboard_api.list_queue(&[]).unwrap().is_empty());
    assert!(state.plan_api.get_profile().unwrap().is_some());
    let rebuilt = state.plan_api.build_master_queue(false).unwrap();
    assert!(rebuilt.rebuilt);
    assert_eq!(rebuilt.total_topics, 2);
}

#[tokio::test]
async fn test_week_maintenance_guards() {
    let (_temp, state) = app_fixture();
    let mut csv_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    csv_file.write_all(CSV.as_bytes()).unwrap();
    csv_file.flush().unwrap();
    state.plan_api.import_catalog(csv_file.path()).await.unwrap();
    state.plan_api.save_profile(&make_profile(90)).unwrap();
    state.plan_api.build_master_queue(false).unwrap();

    // get_week 懒创建: 七天默认容量
    let week = state.schedule_api.get_week(monday()).unwrap();
    assert_eq!(week.days().len(), 7);
    assert_eq!(week.day_capacity_minutes.get(&monday()), Some(&90));

    // 正常的容量与休息日维护
    let week = state.schedule_api.set_day_capacity(monday(), 45).unwrap();
    assert_eq!(week.day_capacity_minutes.get(&monday()), Some(&45));
    let tuesday = monday().succ_opt().unwrap();
    let week = state.schedule_api.set_off_day(tuesday, true).unwrap();
    assert!(week.is_off(tuesday));

    // 有切片在身的日拒绝休息日标记
    let outcome = state
        .schedule_api
        .schedule_topic_to_day(monday(), SequenceKey(1))
        .unwrap();
    assert!(matches!(outcome, ScheduleOutcome::Placed { .. }));
    let err = state.schedule_api.set_off_day(monday(), true).unwrap_err();
    assert!(matches!(err, ApiError::BusinessRuleViolation(_)));

    // 结算后的日拒绝容量变更
    state.schedule_api.finalize_day(monday()).unwrap();
    let err = state.schedule_api.set_day_capacity(monday(), 60).unwrap_err();
    assert!(matches!(err, ApiError::BusinessRuleViolation(_)));

    // 负容量拒绝
    let err = state.schedule_api.set_day_capacity(tuesday, -5).unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[tokio::test]
async fn test_profile_validation() {
    let (_temp, state) = app_fixture();

    let mut profile = make_profile(0);
    let err = state.plan_api.save_profile(&profile).unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    profile.daily_minutes_default = 120;
    profile.target_exam_date = Some(monday() - chrono::Duration::days(1));
    let err = state.plan_api.save_profile(&profile).unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    profile.target_exam_date = Some(monday() + chrono::Duration::days(180));
    state.plan_api.save_profile(&profile).unwrap();
    assert!(state.plan_api.get_profile().unwrap().is_some());
}

#[test]
fn test_get_week_without_profile_falls_back_to_config_default() {
    let (_temp, state) = app_fixture();

    // 无档案: 懒创建的周容量取自 config_kv 覆写值, 而非写死的 120
    let cfg = ConfigManager::from_connection(open_shared_connection(&state.db_path)).unwrap();
    cfg.set_value(config_keys::DEFAULT_DAILY_MINUTES, "75").unwrap();

    let week = state.schedule_api.get_week(monday()).unwrap();
    assert_eq!(week.day_capacity_minutes.get(&monday()), Some(&75));
}

#[test]
fn test_build_queue_without_profile_fails() {
    let (_temp, state) = app_fixture();
    let err = state.plan_api.build_master_queue(false).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}
