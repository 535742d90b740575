// ==========================================
// 备考学习计划排程系统 - 主入口
// ==========================================
// 系统定位: 无界面排程内核, UI 作为外部协作方经库接口接入
// ==========================================

use study_plan_aps::app::{get_default_db_path, AppState};

fn main() {
    study_plan_aps::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", study_plan_aps::APP_NAME);
    tracing::info!("系统版本: {}", study_plan_aps::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let app_state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("无法初始化AppState: {}", e);
            std::process::exit(1);
        }
    };

    // 启动自检: 报告档案与队列现状
    match app_state.profile_repo.find() {
        Ok(Some(profile)) => {
            tracing::info!(
                start_date = %profile.start_date,
                daily_minutes = profile.daily_minutes_default,
                "已加载学习档案"
            );
        }
        Ok(None) => tracing::info!("尚未创建学习档案"),
        Err(e) => tracing::warn!("读取学习档案失败: {}", e),
    }
    match app_state.queue_repo.count() {
        Ok(0) => tracing::info!("主队列为空, 等待目录导入与构建"),
        Ok(n) => tracing::info!(entries = n, "主队列就绪"),
        Err(e) => tracing::warn!("读取主队列失败: {}", e),
    }

    tracing::info!("初始化完成; 本程序为库内核载体, 排程操作经库接口调用");
}
