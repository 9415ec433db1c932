use serde::{Deserialize, Serialize};

use crate::fingerprint::round_to;

const DEMAND_WEIGHT: f64 = 0.45;
const COMPETITION_WEIGHT: f64 = 0.30;
const CAPABILITY_WEIGHT: f64 = 0.25;

/// DCC スコアに基づく推奨度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Pursue,
    Investigate,
    Pass,
}

/// Demand / Competition / Capability の合成スコア
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DccScore {
    pub demand: f64,
    pub competition: f64,
    pub capability: f64,
    pub score: f64,
    pub recommendation: Recommendation,
}

/// DCC スコアを計算する
///
/// 競合スコアは低いほど有利なので `100 - competition` で反転させて合成する。
/// 入力はそれぞれ 0-100 に丸めてから使う。
pub fn dcc_score(demand: f64, competition: f64, capability: f64) -> DccScore {
    let demand = demand.clamp(0.0, 100.0);
    let competition = competition.clamp(0.0, 100.0);
    let capability = capability.clamp(0.0, 100.0);

    let score = demand * DEMAND_WEIGHT
        + (100.0 - competition) * COMPETITION_WEIGHT
        + capability * CAPABILITY_WEIGHT;
    let score = round_to(score, 2);

    let recommendation = if score >= 70.0 {
        Recommendation::Pursue
    } else if score >= 50.0 {
        Recommendation::Investigate
    } else {
        Recommendation::Pass
    };

    DccScore {
        demand,
        competition,
        capability,
        score,
        recommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_sum() {
        let dcc = dcc_score(80.0, 40.0, 60.0);
        // 36 + 18 + 15
        assert_eq!(dcc.score, 69.0);
        assert_eq!(dcc.recommendation, Recommendation::Investigate);
    }

    #[test]
    fn test_recommendation_bands() {
        assert_eq!(dcc_score(100.0, 0.0, 100.0).recommendation, Recommendation::Pursue);
        assert_eq!(dcc_score(0.0, 100.0, 0.0).recommendation, Recommendation::Pass);
    }

    #[test]
    fn test_inputs_are_clamped() {
        let dcc = dcc_score(150.0, -20.0, 100.0);
        assert_eq!(dcc.demand, 100.0);
        assert_eq!(dcc.competition, 0.0);
        assert_eq!(dcc.score, 100.0);
    }
}
