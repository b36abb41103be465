//! Severity Scorer
//!
//! Pure functions mapping detection fields into a bounded 0-100 severity
//! value. Two variants: structural damage (potholes, cracks) and traffic
//! congestion.

use serde::{Deserialize, Serialize};

/// Weights for the explicit component path, in order:
/// criticality, size, persistence, impact, visual quality.
const COMPONENT_WEIGHTS: [f64; 5] = [0.30, 0.25, 0.20, 0.15, 0.10];

/// Linear gain applied to the normalized defect area in the fallback path
const AREA_GAIN: f64 = 5000.0;
/// Saturation cap on the area contribution
const AREA_CAP: f64 = 30.0;

/// Explicit weighted sub-scores, each on a 0-100 scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityComponents {
    pub criticality: f64,
    pub size: f64,
    pub persistence: f64,
    pub impact: f64,
    pub visual_quality: f64,
}

/// Kind of structural damage, selects the fixed fallback bonus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageKind {
    Pothole,
    Crack,
    Other,
}

impl DamageKind {
    fn bonus(&self) -> f64 {
        match self {
            DamageKind::Pothole => 20.0,
            DamageKind::Crack => 10.0,
            DamageKind::Other => 5.0,
        }
    }
}

/// Input to the structural severity score
#[derive(Debug, Clone, Default)]
pub struct StructuralInput {
    /// Explicit weighted sub-scores, preferred when the detector emits them
    pub components: Option<SeverityComponents>,
    /// Best model confidence in [0,1]
    pub confidence: f64,
    /// Normalized defect area as a fraction of the frame, in [0,1]
    pub defect_area: f64,
    pub kind: DamageKind,
}

impl Default for DamageKind {
    fn default() -> Self {
        DamageKind::Other
    }
}

/// Severity of a structural-damage detection, clamped to [0,100].
///
/// With explicit components the score is their fixed-weight combination.
/// Otherwise confidence contributes up to 50 points, defect area up to 30
/// (linear with a saturation cap), and the damage kind a fixed bonus.
pub fn structural_severity(input: &StructuralInput) -> f64 {
    if let Some(c) = &input.components {
        let score = c.criticality * COMPONENT_WEIGHTS[0]
            + c.size * COMPONENT_WEIGHTS[1]
            + c.persistence * COMPONENT_WEIGHTS[2]
            + c.impact * COMPONENT_WEIGHTS[3]
            + c.visual_quality * COMPONENT_WEIGHTS[4];
        return score.clamp(0.0, 100.0);
    }

    let base = input.confidence * 50.0;
    let area = (input.defect_area * AREA_GAIN).min(AREA_CAP);
    (base + area + input.kind.bonus()).clamp(0.0, 100.0)
}

/// Severity of a congestion detection, clamped to [0,100].
///
/// Coverage and vehicle count contribute independently, up to 50 points
/// each: `min(coverage * 100 * 0.5 + min(count * 2, 50), 100)`.
pub fn congestion_severity(coverage_fraction: f64, vehicle_count: u32) -> f64 {
    let coverage_score = coverage_fraction * 100.0 * 0.5;
    let count_score = (vehicle_count as f64 * 2.0).min(50.0);
    (coverage_score + count_score).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_component_path_uses_fixed_weights() {
        let input = StructuralInput {
            components: Some(SeverityComponents {
                criticality: 100.0,
                size: 80.0,
                persistence: 60.0,
                impact: 40.0,
                visual_quality: 20.0,
            }),
            ..Default::default()
        };
        // 30 + 20 + 12 + 6 + 2
        assert!((structural_severity(&input) - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_component_path_clamps_high() {
        let input = StructuralInput {
            components: Some(SeverityComponents {
                criticality: 500.0,
                size: 500.0,
                persistence: 500.0,
                impact: 500.0,
                visual_quality: 500.0,
            }),
            ..Default::default()
        };
        assert_eq!(structural_severity(&input), 100.0);
    }

    #[test]
    fn test_fallback_path_pothole() {
        let input = StructuralInput {
            components: None,
            confidence: 0.8,
            defect_area: 0.002,
            kind: DamageKind::Pothole,
        };
        // 40 + 10 + 20
        assert!((structural_severity(&input) - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_area_saturates() {
        let input = StructuralInput {
            components: None,
            confidence: 0.0,
            defect_area: 0.5,
            kind: DamageKind::Crack,
        };
        // area capped at 30, plus crack bonus 10
        assert!((structural_severity(&input) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_kind_bonus_ordering() {
        let base = StructuralInput {
            confidence: 0.5,
            defect_area: 0.0,
            ..Default::default()
        };
        let pothole = StructuralInput { kind: DamageKind::Pothole, ..base.clone() };
        let crack = StructuralInput { kind: DamageKind::Crack, ..base.clone() };
        let other = StructuralInput { kind: DamageKind::Other, ..base };
        assert!(structural_severity(&pothole) > structural_severity(&crack));
        assert!(structural_severity(&crack) > structural_severity(&other));
    }

    #[test]
    fn test_congestion_contributions() {
        // coverage alone caps at 50
        assert_eq!(congestion_severity(1.0, 0), 50.0);
        // count alone caps at 50 (25 vehicles)
        assert_eq!(congestion_severity(0.0, 25), 50.0);
        assert_eq!(congestion_severity(0.0, 100), 50.0);
        // both maxed clamps at 100
        assert_eq!(congestion_severity(1.0, 100), 100.0);
        // mid-range
        assert!((congestion_severity(0.2, 5) - 20.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_congestion_monotone_in_count(
            coverage in 0.0f64..1.0,
            count in 0u32..60,
        ) {
            let lo = congestion_severity(coverage, count);
            let hi = congestion_severity(coverage, count + 1);
            prop_assert!(hi >= lo);
        }

        #[test]
        fn prop_congestion_monotone_in_coverage(
            coverage in 0.0f64..0.99,
            count in 0u32..60,
        ) {
            let lo = congestion_severity(coverage, count);
            let hi = congestion_severity(coverage + 0.01, count);
            prop_assert!(hi >= lo);
        }

        #[test]
        fn prop_structural_bounded(
            confidence in 0.0f64..1.0,
            area in 0.0f64..1.0,
        ) {
            let input = StructuralInput {
                components: None,
                confidence,
                defect_area: area,
                kind: DamageKind::Pothole,
            };
            let s = structural_severity(&input);
            prop_assert!((0.0..=100.0).contains(&s));
        }
    }
}
