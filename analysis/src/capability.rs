use serde::{Deserialize, Serialize};

use crate::category::contains_any;
use crate::fingerprint::round_to;

/// 社内スキルと習熟度（0-100）
const INTERNAL_SKILLS: &[(&str, f64)] = &[
    ("software_development", 85.0),
    ("hardware_engineering", 70.0),
    ("product_design", 90.0),
    ("manufacturing", 60.0),
    ("supply_chain", 75.0),
    ("quality_assurance", 80.0),
    ("regulatory_compliance", 65.0),
    ("marketing", 85.0),
    ("customer_support", 90.0),
    ("data_analytics", 95.0),
    ("ai_ml", 80.0),
    ("iot_development", 70.0),
    ("mobile_development", 85.0),
    ("cloud_infrastructure", 90.0),
];

const CONNECTED_SKILLS: &[&str] = &[
    "iot_development",
    "software_development",
    "hardware_engineering",
    "mobile_development",
];
const DIGITAL_SKILLS: &[&str] = &[
    "software_development",
    "mobile_development",
    "cloud_infrastructure",
    "data_analytics",
];
const PHYSICAL_SKILLS: &[&str] = &["product_design", "manufacturing", "marketing", "supply_chain"];

const FALLBACK_GAP: &str = "Specialized domain knowledge";
const MAX_SKILL_GAPS: usize = 3;

/// 準備度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Readiness {
    High,
    Medium,
    Low,
}

impl Readiness {
    fn grade(value: f64, high: f64, medium: f64) -> Self {
        if value >= high {
            Readiness::High
        } else if value >= medium {
            Readiness::Medium
        } else {
            Readiness::Low
        }
    }
}

/// 協力サプライヤー
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub name: String,
    pub capability: f64,
    pub cost: String,
    pub lead_time: String,
}

/// 規制・安全面の確認状況
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceStatus {
    pub regulatory: String,
    pub safety: String,
    pub environmental: String,
    pub data_privacy: String,
}

/// 実行能力分析の結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub capability_score: f64,
    pub skill_matches: Vec<String>,
    pub skill_gaps: Vec<String>,
    pub internal_readiness: Readiness,
    pub supplier_readiness: Readiness,
    pub team_size: usize,
    pub suppliers: Vec<Supplier>,
    pub time_to_market: String,
    pub compliance_status: ComplianceStatus,
    pub recommended_actions: Vec<String>,
    pub risk_factors: Vec<String>,
    pub data_source: String,
}

struct InternalCapability {
    skills: Vec<(&'static str, f64)>,
    avg_skill_level: f64,
    readiness: Readiness,
    team_size: usize,
}

struct SupplierCapability {
    suppliers: Vec<Supplier>,
    avg_capability: f64,
    readiness: Readiness,
}

/// 製品を自社で実現できるかを分析する
///
/// # Arguments
/// * `query` - 分析対象の製品名
/// * `required_skills` - 呼び出し元が必須と指定したスキル。社内に無いものはスキルギャップになる
pub fn analyze_capability(query: &str, required_skills: &[String]) -> CapabilityReport {
    let lower = query.to_lowercase();
    let internal = internal_capability(&lower);
    let supplier = supplier_capability(&lower);

    let has_skill = |name: &str| internal.skills.iter().any(|(skill, _)| *skill == name);

    let mut gaps: Vec<String> = required_skills
        .iter()
        .filter(|skill| !has_skill(skill.as_str()))
        .cloned()
        .collect();
    if lower.contains("smart") && !has_skill("ai_ml") {
        gaps.push("AI/ML expertise".to_string());
    }
    if lower.contains("mobile") && !has_skill("mobile_development") {
        gaps.push("Mobile app development".to_string());
    }
    if lower.contains("hardware") && !has_skill("hardware_engineering") {
        gaps.push("Hardware engineering".to_string());
    }
    if !has_skill("manufacturing") {
        gaps.push("Manufacturing expertise".to_string());
    }
    gaps.truncate(MAX_SKILL_GAPS);
    if gaps.is_empty() {
        gaps.push(FALLBACK_GAP.to_string());
    }

    let (time_to_market, time_score) = match (internal.readiness, supplier.readiness) {
        (Readiness::High, Readiness::High) => ("3-6 months", 90.0),
        (Readiness::Medium, _) | (_, Readiness::Medium) => ("6-12 months", 70.0),
        _ => ("12-18 months", 50.0),
    };

    let compliance_status = ComplianceStatus {
        regulatory: if lower.contains("device") {
            "Needs Assessment"
        } else {
            "Standard Review"
        }
        .to_string(),
        safety: "Compliant".to_string(),
        environmental: if lower.contains("electronics") {
            "Needs Review"
        } else {
            "Compliant"
        }
        .to_string(),
        data_privacy: if lower.contains("smart") {
            "Compliant"
        } else {
            "Not Applicable"
        }
        .to_string(),
    };

    let mut risk_factors = Vec::new();
    if internal.avg_skill_level < 70.0 {
        risk_factors.push("Internal skill gaps".to_string());
    }
    if supplier.avg_capability < 75.0 {
        risk_factors.push("Supplier capability limitations".to_string());
    }
    if gaps.len() > 2 {
        risk_factors.push("Multiple skill gaps to address".to_string());
    }
    if lower.contains("smart") {
        risk_factors.push("Technology complexity".to_string());
    }

    let mut recommended_actions = vec![format!(
        "Acquire expertise in: {}",
        gaps.iter().take(2).cloned().collect::<Vec<_>>().join(", ")
    )];
    if supplier.readiness != Readiness::High {
        recommended_actions.push("Strengthen supplier partnerships".to_string());
    }
    if internal.team_size < 10 {
        recommended_actions.push("Scale development team".to_string());
    }
    recommended_actions.push("Conduct detailed feasibility study".to_string());

    let score = internal.avg_skill_level * 0.4 + supplier.avg_capability * 0.3 + time_score * 0.2
        - risk_factors.len() as f64 * 5.0;

    CapabilityReport {
        capability_score: round_to(score.clamp(0.0, 100.0), 2),
        skill_matches: internal
            .skills
            .iter()
            .take(4)
            .map(|(skill, _)| skill.to_string())
            .collect(),
        skill_gaps: gaps,
        internal_readiness: internal.readiness,
        supplier_readiness: supplier.readiness,
        team_size: internal.team_size,
        suppliers: supplier.suppliers,
        time_to_market: time_to_market.to_string(),
        compliance_status,
        recommended_actions,
        risk_factors,
        data_source: "enhanced_analysis".to_string(),
    }
}

fn internal_capability(lower: &str) -> InternalCapability {
    let relevant = if contains_any(lower, &["smart", "iot", "connected"]) {
        CONNECTED_SKILLS
    } else if contains_any(lower, &["app", "software", "digital"]) {
        DIGITAL_SKILLS
    } else {
        PHYSICAL_SKILLS
    };

    let skills: Vec<(&'static str, f64)> = relevant
        .iter()
        .filter_map(|name| INTERNAL_SKILLS.iter().find(|(skill, _)| skill == name).copied())
        .collect();

    let avg_skill_level = if skills.is_empty() {
        50.0
    } else {
        skills.iter().map(|(_, level)| level).sum::<f64>() / skills.len() as f64
    };

    InternalCapability {
        team_size: skills.len() * 3,
        readiness: Readiness::grade(avg_skill_level, 80.0, 65.0),
        avg_skill_level,
        skills,
    }
}

fn supplier_capability(lower: &str) -> SupplierCapability {
    let supplier = |name: &str, capability: f64, cost: &str, lead_time: &str| Supplier {
        name: name.to_string(),
        capability,
        cost: cost.to_string(),
        lead_time: lead_time.to_string(),
    };

    let suppliers = if contains_any(lower, &["electronics", "smart", "device"]) {
        vec![
            supplier("electronics_manufacturing", 85.0, "medium", "8-12 weeks"),
            supplier("component_sourcing", 90.0, "low", "4-6 weeks"),
            supplier("pcb_assembly", 80.0, "medium", "6-8 weeks"),
        ]
    } else {
        vec![
            supplier("general_manufacturing", 75.0, "medium", "8-12 weeks"),
            supplier("material_sourcing", 80.0, "medium", "4-6 weeks"),
        ]
    };

    let avg_capability =
        suppliers.iter().map(|s| s.capability).sum::<f64>() / suppliers.len() as f64;

    SupplierCapability {
        readiness: Readiness::grade(avg_capability, 85.0, 70.0),
        avg_capability,
        suppliers,
    }
}
