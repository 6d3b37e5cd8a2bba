use crate::verdict::{ConfidenceTier, FusedVerdict, ImageSubScore, AMBER, GREEN, RED};

/// 模块：结果融合器 (ResultFuser)
///
/// **职责**: 把两路独立子评分（元数据真实性 %、AI 生成概率 %）按
/// 罚分 + 加权方案合成最终裁定。
///
/// **罚分规则**: 自上而下对**原始百分比**求值，先命中者生效：
/// 1. AI ≥ 70 且 AI 通道为红 → 完全信任检测器，绕过加权直接判 AI 生成
/// 2. AI ≥ 70 且元数据 = 0   → AI 置信度 ×0.75
///    （歧义情形：可能是转存图被剥了元数据，也可能是高级伪造）
/// 3. AI ∈ [30,70) 且元数据 = 0 → ×0.5（可疑组合）
/// 4. 元数据 ∈ (0,30)          → ×0.85（弱真实性信号）
/// 5. 其余                      → 不罚分
///
/// **加权**: 元数据 = 0 时 AI:元数据 = 80:20（完全没有相机证据时更信 AI），
/// 否则 60:40。final = aiConf×aiW + metaConf×metaW。
///
/// **分档**: final ≥ 0.65 → Likely Real；final ≤ 0.40 → Likely AI-Generated
/// （展示置信度取 100 − final%）；其余 → Uncertain。
/// `details` 恒带两路子标签原文，便于审计。

const AI_CONFIDENT_THRESHOLD: u32 = 70;
const AI_UNCERTAIN_THRESHOLD: u32 = 30;
const WEAK_METADATA_THRESHOLD: u32 = 30;

const LIKELY_REAL_FLOOR: f64 = 0.65;
const LIKELY_AI_CEILING: f64 = 0.40;

/// 双信号融合。纯函数：相同输入恒得相同裁定。
pub fn fuse(meta: &ImageSubScore, ai: &ImageSubScore) -> FusedVerdict {
    let meta_pct = meta.score;
    let ai_pct = ai.score;
    let details = format!("Metadata: {} | AI: {}", meta.label, ai.label);

    // 规则 1：检测器高置信判 AI 生成 → 完全信任，忽略元数据
    if ai_pct >= AI_CONFIDENT_THRESHOLD && ai.color == RED {
        return FusedVerdict {
            label: format!("Likely AI-Generated ({ai_pct}% confidence)"),
            color: RED,
            confidence: ConfidenceTier::High,
            details,
        };
    }

    let meta_confidence = meta_pct as f64 / 100.0;
    let mut ai_confidence = ai_pct as f64 / 100.0;

    // 规则 2~4：罚分
    if ai_pct >= AI_CONFIDENT_THRESHOLD && meta_pct == 0 {
        ai_confidence *= 0.75;
    } else if ai_pct >= AI_UNCERTAIN_THRESHOLD
        && ai_pct < AI_CONFIDENT_THRESHOLD
        && meta_pct == 0
    {
        ai_confidence *= 0.5;
    } else if meta_pct > 0 && meta_pct < WEAK_METADATA_THRESHOLD {
        ai_confidence *= 0.85;
    }

    let (ai_weight, meta_weight) = if meta_pct == 0 {
        (0.80, 0.20)
    } else {
        (0.60, 0.40)
    };
    let final_score = ai_confidence * ai_weight + meta_confidence * meta_weight;
    let final_pct = (final_score * 100.0).round() as i64;

    classify_final(final_score, final_pct, meta_pct, ai_pct, details)
}

/// 合成得分（0..1 刻度）分档；阈值端点含义：≥0.65 / ≤0.40
fn classify_final(
    final_score: f64,
    final_pct: i64,
    meta_pct: u32,
    ai_pct: u32,
    details: String,
) -> FusedVerdict {
    if final_score >= LIKELY_REAL_FLOOR {
        let mut details = details;
        if meta_pct == 0 && ai_pct < AI_UNCERTAIN_THRESHOLD {
            // 检测器读作真实但完全没有相机痕迹：多半是转存图
            details.push_str(" | Note: No camera data (possibly downloaded/shared)");
        }
        FusedVerdict {
            label: format!("Likely Real ({final_pct}% confidence)"),
            color: GREEN,
            confidence: ConfidenceTier::High,
            details,
        }
    } else if final_score <= LIKELY_AI_CEILING {
        FusedVerdict {
            label: format!("Likely AI-Generated ({}% confidence)", 100 - final_pct),
            color: RED,
            confidence: ConfidenceTier::High,
            details,
        }
    } else {
        let advice = if meta_pct == 0 {
            "Check if image source is legitimate (Google, social media, etc.)"
        } else {
            "Manual review recommended"
        };
        FusedVerdict {
            label: format!("Uncertain ({final_pct}% confidence)"),
            color: AMBER,
            confidence: ConfidenceTier::Medium,
            details: format!("{details} | {advice}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::sub_score_from_probability;
    use crate::metadata::{no_metadata_fallback, score_facts, ExifFacts};

    fn meta_sub(score: u32) -> ImageSubScore {
        ImageSubScore {
            score,
            label: format!("Authentic ({score}% metadata)"),
            color: GREEN,
            confidence: ConfidenceTier::High,
            details: "Camera: Canon".to_string(),
        }
    }

    fn ai_sub(score: u32, label: &str, color: &'static str) -> ImageSubScore {
        ImageSubScore {
            score,
            label: label.to_string(),
            color,
            confidence: ConfidenceTier::High,
            details: String::new(),
        }
    }

    #[test]
    fn fusion_is_deterministic() {
        let meta = meta_sub(50);
        let ai = sub_score_from_probability(0.5);
        assert_eq!(fuse(&meta, &ai), fuse(&meta, &ai));
    }

    #[test]
    fn confident_red_detector_bypasses_weighting() {
        // 元数据再强也拦不住规则 1
        let meta = meta_sub(90);
        let ai = ai_sub(85, "AI-Generated (85% confidence)", RED);

        let verdict = fuse(&meta, &ai);
        assert_eq!(verdict.label, "Likely AI-Generated (85% confidence)");
        assert_eq!(verdict.color, RED);
        assert_eq!(verdict.confidence, ConfidenceTier::High);
    }

    #[test]
    fn zero_metadata_with_high_reading_gets_moderate_discount() {
        // 读数 ≥70 但通道不是红（检测器方向为真实）：走规则 2，
        // 打 75 折并按 80:20 加权 → 0.75×0.75×0.8 = 0.45 → Uncertain
        let meta = no_metadata_fallback();
        let ai = ai_sub(75, "Real Photo (25% confidence)", GREEN);

        let verdict = fuse(&meta, &ai);
        assert_eq!(verdict.label, "Uncertain (45% confidence)");
        assert_eq!(verdict.confidence, ConfidenceTier::Medium);
        assert!(verdict
            .details
            .contains("Check if image source is legitimate"));
    }

    #[test]
    fn zero_metadata_with_uncertain_reading_gets_heavy_discount() {
        // 规则 3：0.5×0.5×0.8 = 0.20 ≤ 0.40 → 判 AI 生成（80%）
        let meta = no_metadata_fallback();
        let ai = sub_score_from_probability(0.5);

        let verdict = fuse(&meta, &ai);
        assert_eq!(verdict.label, "Likely AI-Generated (80% confidence)");
        assert_eq!(verdict.color, RED);
    }

    #[test]
    fn weak_metadata_gets_light_discount() {
        // 规则 4：元数据 ∈ (0,30) 时 AI 置信度 ×0.85
        let meta = meta_sub(20);
        let ai = sub_score_from_probability(0.5);

        let verdict = fuse(&meta, &ai);
        assert!(verdict.label.starts_with("Likely AI-Generated"));
        assert_eq!(verdict.color, RED);
        assert_eq!(verdict.confidence, ConfidenceTier::High);
    }

    #[test]
    fn band_boundaries_are_inclusive_as_documented() {
        let d = "Metadata: m | AI: a".to_string();
        assert!(classify_final(0.65, 65, 50, 10, d.clone())
            .label
            .starts_with("Likely Real"));
        assert_eq!(
            classify_final(0.40, 40, 50, 10, d.clone()).label,
            "Likely AI-Generated (60% confidence)"
        );
        assert!(classify_final(0.55, 55, 50, 10, d)
            .label
            .starts_with("Uncertain"));
    }

    #[test]
    fn stripped_exif_with_confident_detector_hit() {
        // 无 EXIF + 检测器 [{artificial, 0.82}] → 82% 红 → 规则 1 直判
        let meta = no_metadata_fallback();
        let ai = sub_score_from_probability(0.82);

        let verdict = fuse(&meta, &ai);
        assert_eq!(verdict.label, "Likely AI-Generated (82% confidence)");
        assert_eq!(verdict.color, RED);
        assert_eq!(verdict.confidence, ConfidenceTier::High);
        assert!(verdict.details.contains("No metadata"));
        assert!(verdict.details.contains("AI-Generated (82% confidence)"));
    }

    #[test]
    fn strong_metadata_is_outweighed_by_confident_real_reading() {
        // 元数据 75 + 检测器 [{real, 0.9}] → AI 概率 10%，无罚分，
        // 60/40 加权：0.10×0.6 + 0.75×0.4 = 0.36 → 判 AI 生成（64%）。
        // 这是规则方案的既有行为，按原样保留。
        let facts = ExifFacts {
            camera_make: Some("Canon".to_string()),
            camera_model: Some("EOS R5".to_string()),
            captured_at: Some("2025:10:01 09:00:00".to_string()),
            has_gps: true,
            exposure_time: Some("1/125".to_string()),
            ..Default::default()
        };
        let meta = score_facts(&facts);
        assert_eq!(meta.score, 75);

        let ai = sub_score_from_probability(1.0 - 0.9);
        assert_eq!(ai.score, 10);

        let verdict = fuse(&meta, &ai);
        assert_eq!(verdict.label, "Likely AI-Generated (64% confidence)");
        assert_eq!(verdict.color, RED);
        assert_eq!(verdict.confidence, ConfidenceTier::High);
    }

    #[test]
    fn details_carry_both_sub_labels_verbatim() {
        let meta = meta_sub(50);
        let ai = sub_score_from_probability(0.5);

        let verdict = fuse(&meta, &ai);
        assert!(verdict.details.contains(&meta.label));
        assert!(verdict.details.contains(&ai.label));
    }
}
