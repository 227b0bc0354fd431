//! 几何威胁策略 (Geometry threat policies)
//!
//! 两种互斥策略统一在 `ThreatPolicy` 接口之后, 由配置选择:
//! - Proximity:  人框与武器框中心距离 < 0.8 × 人框对角线 → 高威胁
//! - WeaponOnly: 检测器只输出武器类别时使用, 任一武器即高威胁
//!
//! 亮度闸门在策略之前生效: 画面过暗时直接返回照明警告, 不看检测内容。

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::types::{Detection, Frame, FrameAssessment, ThreatStatus};

/// 高威胁评分 (人持武器 / 武器专用模型命中)
pub const THREAT_SCORE: u32 = 10;

/// 仅有武器、无贴近人员时的评分
pub const CAUTION_SCORE: u32 = 4;

/// 贴近判定系数: 中心距离 < 系数 × 人框对角线
pub const PROXIMITY_RATIO: f32 = 0.8;

/// 威胁策略接口: 一帧检测 → 一份评估
pub trait ThreatPolicy: Send {
    fn name(&self) -> &'static str;

    fn assess(&self, detections: &[Detection]) -> FrameAssessment;
}

/// 策略选择 (配置文件与命令行共用)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// 人-武器贴近判定 (检测器可输出 person 类别)
    Proximity,
    /// 武器专用检测器: 任一武器类别即威胁
    WeaponOnly,
}

impl PolicyKind {
    /// 从命令行字符串解析, 未知取值回落到 Proximity
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "weapon-only" | "weapon_only" | "weaponly" => PolicyKind::WeaponOnly,
            "proximity" => PolicyKind::Proximity,
            other => {
                eprintln!("⚠️ 未知策略 \"{}\", 使用 proximity", other);
                PolicyKind::Proximity
            }
        }
    }

    pub fn build(self, weapon_classes: Vec<String>) -> Box<dyn ThreatPolicy> {
        match self {
            PolicyKind::Proximity => Box::new(ProximityPolicy::new(weapon_classes)),
            PolicyKind::WeaponOnly => Box::new(WeaponOnlyPolicy::new(weapon_classes)),
        }
    }
}

fn collect_objects(detections: &[Detection]) -> BTreeSet<String> {
    detections.iter().map(|d| d.class_name.clone()).collect()
}

/// 贴近判定策略
pub struct ProximityPolicy {
    weapon_classes: Vec<String>,
    proximity_ratio: f32,
}

impl ProximityPolicy {
    pub fn new(weapon_classes: Vec<String>) -> Self {
        Self {
            weapon_classes,
            proximity_ratio: PROXIMITY_RATIO,
        }
    }

    pub fn with_ratio(weapon_classes: Vec<String>, proximity_ratio: f32) -> Self {
        Self {
            weapon_classes,
            proximity_ratio,
        }
    }

    fn is_weapon(&self, class_name: &str) -> bool {
        self.weapon_classes.iter().any(|w| w == class_name)
    }
}

impl ThreatPolicy for ProximityPolicy {
    fn name(&self) -> &'static str {
        "proximity"
    }

    fn assess(&self, detections: &[Detection]) -> FrameAssessment {
        let objects = collect_objects(detections);

        let person_boxes: Vec<_> = detections
            .iter()
            .filter(|d| d.class_name == "person")
            .map(|d| d.bbox)
            .collect();
        let weapon_boxes: Vec<_> = detections
            .iter()
            .filter(|d| self.is_weapon(&d.class_name))
            .map(|d| d.bbox)
            .collect();

        // 存在性判定: 任一 (人, 武器) 对满足贴近即高威胁, 首个命中即停
        for person in &person_boxes {
            let threshold = self.proximity_ratio * person.diagonal();
            for weapon in &weapon_boxes {
                if person.center_distance(weapon) < threshold {
                    return FrameAssessment {
                        raw_threat: true,
                        score: THREAT_SCORE,
                        objects,
                        status: ThreatStatus::HighThreat,
                    };
                }
            }
        }

        // 有武器但未贴近人员: 提示而非报警
        if !weapon_boxes.is_empty() {
            return FrameAssessment {
                raw_threat: false,
                score: CAUTION_SCORE,
                objects,
                status: ThreatStatus::Caution,
            };
        }

        FrameAssessment::normal(objects)
    }
}

/// 武器专用策略: 上游检测器没有 person 类别时使用
pub struct WeaponOnlyPolicy {
    weapon_classes: Vec<String>,
}

impl WeaponOnlyPolicy {
    pub fn new(weapon_classes: Vec<String>) -> Self {
        Self { weapon_classes }
    }
}

impl ThreatPolicy for WeaponOnlyPolicy {
    fn name(&self) -> &'static str {
        "weapon-only"
    }

    fn assess(&self, detections: &[Detection]) -> FrameAssessment {
        let objects = collect_objects(detections);
        let weapon_present = detections
            .iter()
            .any(|d| self.weapon_classes.iter().any(|w| w == &d.class_name));

        if weapon_present {
            FrameAssessment {
                raw_threat: true,
                score: THREAT_SCORE,
                objects,
                status: ThreatStatus::HighThreat,
            }
        } else {
            FrameAssessment::normal(objects)
        }
    }
}

/// 几何评估器: 亮度闸门 + 可插拔威胁策略
pub struct GeometryEvaluator {
    policy: Box<dyn ThreatPolicy>,
    brightness_floor: f32,
}

impl GeometryEvaluator {
    pub fn new(policy: Box<dyn ThreatPolicy>, brightness_floor: f32) -> Self {
        Self {
            policy,
            brightness_floor,
        }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// 评估一帧: 返回后的评估结果不再修改
    pub fn evaluate(&self, frame: &Frame, detections: &[Detection]) -> FrameAssessment {
        if frame.brightness() < self.brightness_floor {
            return FrameAssessment::poor_lighting();
        }
        self.policy.assess(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::{BBox, BRIGHTNESS_FLOOR, POOR_LIGHTING};

    fn weapon_classes() -> Vec<String> {
        vec!["knife".to_string(), "scissors".to_string()]
    }

    fn person_at(x: f32, y: f32) -> Detection {
        // 30x40 框, 对角线 50
        Detection::new("person", 0.9, BBox::new(x, y, x + 30.0, y + 40.0))
    }

    fn knife_at(x: f32, y: f32) -> Detection {
        Detection::new("knife", 0.8, BBox::new(x, y, x + 10.0, y + 10.0))
    }

    #[test]
    fn test_proximity_pair_is_high_threat() {
        let policy = ProximityPolicy::new(weapon_classes());
        // 人框中心 (15,20), 对角线 50, 阈值 40; 刀框中心 (25,25), 距离 ≈ 11.2
        let result = policy.assess(&[person_at(0.0, 0.0), knife_at(20.0, 20.0)]);
        assert!(result.raw_threat);
        assert_eq!(result.score, THREAT_SCORE);
        assert_eq!(result.status, ThreatStatus::HighThreat);
        assert!(result.objects.contains("person"));
        assert!(result.objects.contains("knife"));
    }

    #[test]
    fn test_distant_weapon_is_caution() {
        let policy = ProximityPolicy::new(weapon_classes());
        // 刀框中心 (505,505), 距人框中心 ≈ 684 > 阈值 40
        let result = policy.assess(&[person_at(0.0, 0.0), knife_at(500.0, 500.0)]);
        assert!(!result.raw_threat);
        assert_eq!(result.score, CAUTION_SCORE);
        assert_eq!(result.status, ThreatStatus::Caution);
    }

    #[test]
    fn test_weapon_without_person_is_caution() {
        let policy = ProximityPolicy::new(weapon_classes());
        let result = policy.assess(&[knife_at(100.0, 100.0)]);
        assert!(!result.raw_threat);
        assert_eq!(result.status, ThreatStatus::Caution);
    }

    #[test]
    fn test_person_alone_is_normal() {
        let policy = ProximityPolicy::new(weapon_classes());
        let result = policy.assess(&[person_at(0.0, 0.0)]);
        assert!(!result.raw_threat);
        assert_eq!(result.score, 0);
        assert_eq!(result.status, ThreatStatus::Normal);
    }

    #[test]
    fn test_detection_order_does_not_change_verdict() {
        let policy = ProximityPolicy::new(weapon_classes());
        let forward = policy.assess(&[person_at(0.0, 0.0), knife_at(20.0, 20.0)]);
        let reversed = policy.assess(&[knife_at(20.0, 20.0), person_at(0.0, 0.0)]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_weapon_only_policy_skips_proximity() {
        let policy = WeaponOnlyPolicy::new(weapon_classes());
        let result = policy.assess(&[knife_at(500.0, 500.0)]);
        assert!(result.raw_threat);
        assert_eq!(result.score, THREAT_SCORE);
        assert_eq!(result.status, ThreatStatus::HighThreat);

        let clear = policy.assess(&[person_at(0.0, 0.0)]);
        assert!(!clear.raw_threat);
        assert_eq!(clear.status, ThreatStatus::Normal);
    }

    #[test]
    fn test_dark_frame_overrides_detections() {
        let evaluator = GeometryEvaluator::new(
            Box::new(ProximityPolicy::new(weapon_classes())),
            BRIGHTNESS_FLOOR,
        );
        let dark = Frame::solid(64, 48, 10);
        let result = evaluator.evaluate(&dark, &[person_at(0.0, 0.0), knife_at(20.0, 20.0)]);
        assert!(!result.raw_threat);
        assert_eq!(result.score, 0);
        assert_eq!(result.status, ThreatStatus::Warning);
        assert!(result.objects.contains(POOR_LIGHTING));
    }

    #[test]
    fn test_bright_frame_passes_through_to_policy() {
        let evaluator = GeometryEvaluator::new(
            Box::new(ProximityPolicy::new(weapon_classes())),
            BRIGHTNESS_FLOOR,
        );
        let bright = Frame::solid(64, 48, 128);
        let result = evaluator.evaluate(&bright, &[person_at(0.0, 0.0), knife_at(20.0, 20.0)]);
        assert!(result.raw_threat);
        assert_eq!(result.status, ThreatStatus::HighThreat);
    }
}
