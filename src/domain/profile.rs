// ==========================================
// 备考学习计划排程系统 - 计划档案领域模型
// ==========================================
// 职责: 建档期配置, 参数化 QueueCompiler 与默认日容量
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 学习计划档案
///
/// 单学习者模型: 每库一条 (profile_id = 'default')
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanProfile {
    /// 计划起始日
    pub start_date: NaiveDate,
    /// 目标考试日 (可选)
    pub target_exam_date: Option<NaiveDate>,
    /// 默认日容量(分钟), 懒创建周历时使用
    pub daily_minutes_default: i64,
    /// 当前日 ("今天", 排程与预测的基准)
    pub current_day: NaiveDate,
    /// 显式科目顺序 (去重后生效, 剩余科目按字母序追加)
    pub section_order: Vec<String>,
    /// 禁用科目 (整体排除)
    pub disabled_sections: Vec<String>,
    /// 仅保留 HIGH 优先带
    pub restrict_high_priority_only: bool,
}

impl PlanProfile {
    /// 新档案, 其余字段取默认
    pub fn new(start_date: NaiveDate, daily_minutes_default: i64) -> Self {
        Self {
            start_date,
            target_exam_date: None,
            daily_minutes_default,
            current_day: start_date,
            section_order: Vec::new(),
            disabled_sections: Vec::new(),
            restrict_high_priority_only: false,
        }
    }

    /// 计算有效科目顺序
    ///
    /// 规则:
    /// 1. 显式顺序去重保序
    /// 2. 目录内剩余科目按字母序追加
    /// 3. 禁用科目整体剔除
    pub fn effective_section_order(&self, catalog_sections: &[String]) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        for s in &self.section_order {
            if self.disabled_sections.contains(s) {
                continue;
            }
            if !order.contains(s) {
                order.push(s.clone());
            }
        }
        let mut rest: Vec<String> = catalog_sections
            .iter()
            .filter(|s| !order.contains(s) && !self.disabled_sections.contains(s))
            .cloned()
            .collect();
        rest.sort();
        order.extend(rest);
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_section_order_dedup_and_append() {
        let mut p = PlanProfile::new(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(), 120);
        p.section_order = vec!["英语".into(), "数学".into(), "英语".into()];
        let catalog = vec!["政治".into(), "数学".into(), "英语".into(), "专业课".into()];
        assert_eq!(
            p.effective_section_order(&catalog),
            vec!["英语", "数学", "专业课", "政治"]
        );
    }

    #[test]
    fn test_disabled_sections_excluded() {
        let mut p = PlanProfile::new(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(), 120);
        p.section_order = vec!["英语".into()];
        p.disabled_sections = vec!["英语".into(), "政治".into()];
        let catalog = vec!["政治".into(), "数学".into(), "英语".into()];
        assert_eq!(p.effective_section_order(&catalog), vec!["数学"]);
    }
}
