use serde::{Deserialize, Serialize};

// 附件卡片状态条使用的四种颜色（绿/橙/红/灰）
pub const GREEN: &str = "#10b981";
pub const AMBER: &str = "#f59e0b";
pub const RED: &str = "#ef4444";
pub const GRAY: &str = "#6b7280";

/// 置信度档位
///
/// `Loading` 是一个特殊档位：远程模型冷启动中，信号只是暂时不可用，
/// 不等同于失败，也不等同于低置信。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    None,
    Low,
    Medium,
    High,
    Loading,
}

/// 单路信号的子评分（元数据通道 或 AI 检测通道），产出后不可变。
///
/// `score` 的含义按通道而定：
/// - 元数据通道：加法启发式得分（逐项相加，八项全中为 100）
/// - AI 通道：AI 生成概率的整数百分比（0..100）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSubScore {
    pub score: u32,
    pub label: String,
    pub color: &'static str,
    pub confidence: ConfidenceTier,
    pub details: String,
}

/// 最终裁定：渲染到附件卡片上的用户可见结论。
/// 每次打开详情页现算，从不缓存、从不回写存储。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedVerdict {
    pub label: String,
    pub color: &'static str,
    pub confidence: ConfidenceTier,
    pub details: String,
}

impl FusedVerdict {
    /// 两路信号全部缺失时的哨兵值：显式呈现，绝不抛错、绝不留白
    pub fn unavailable() -> Self {
        Self {
            label: "Verification unavailable".to_string(),
            color: GRAY,
            confidence: ConfidenceTier::None,
            details: "Unable to verify image".to_string(),
        }
    }
}

impl From<ImageSubScore> for FusedVerdict {
    /// 仅单路信号存活时的直通转换：裁定即该子评分本身，不做任何加权
    fn from(sub: ImageSubScore) -> Self {
        Self {
            label: sub.label,
            color: sub.color,
            confidence: sub.confidence,
            details: sub.details,
        }
    }
}
