use exif::{In, Tag, Value};
use std::io::Cursor;

use crate::verdict::{ConfidenceTier, ImageSubScore, AMBER, GREEN, RED};

/// 模块：元数据分析器 (MetadataAnalyzer)
///
/// **职责**: 从图片字节流里抽取 EXIF 相机信息，按加法启发式打出真实性子评分。
/// 真实相机拍摄的照片通常带有机型、曝光参数、GPS 等痕迹；AI 生成图或
/// 网图转存则大多被剥得一干二净。
///
/// **失败语义**: 取图失败 / 无 EXIF 都属于"本地可恢复"情形，降级为
/// "No metadata" 回退子评分，绝不向调用方抛错。

/// 与真实性判断相关的 EXIF 事实子集；字段缺失即不计分。
/// 每次取图时派生一次，不持久化。
#[derive(Debug, Default, Clone)]
pub struct ExifFacts {
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub captured_at: Option<String>,
    pub has_gps: bool,
    pub exposure_time: Option<String>,
    pub iso: Option<String>,
    pub focal_length: Option<String>,
    pub orientation: Option<String>,
}

impl ExifFacts {
    /// 解析图片字节流中嵌入的 EXIF 段。
    /// 容器不含 EXIF（常见于 AI 生成图与社交平台转存图）时返回 Err，
    /// 由调用方降级处理。
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let exif = exif::Reader::new().read_from_container(&mut Cursor::new(bytes))?;

        let ascii = |tag: Tag| -> Option<String> {
            exif.get_field(tag, In::PRIMARY)
                .and_then(|f| match &f.value {
                    Value::Ascii(v) => v
                        .first()
                        .map(|s| String::from_utf8_lossy(s).trim_end_matches('\0').trim().to_string()),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
        };
        let display = |tag: Tag| -> Option<String> {
            exif.get_field(tag, In::PRIMARY)
                .map(|f| f.display_value().to_string())
        };

        Ok(Self {
            camera_make: ascii(Tag::Make),
            camera_model: ascii(Tag::Model),
            // DateTime 优先，回退 DateTimeOriginal
            captured_at: ascii(Tag::DateTime).or_else(|| ascii(Tag::DateTimeOriginal)),
            has_gps: exif.get_field(Tag::GPSLatitude, In::PRIMARY).is_some()
                || exif.get_field(Tag::GPSLongitude, In::PRIMARY).is_some(),
            exposure_time: display(Tag::ExposureTime),
            iso: display(Tag::PhotographicSensitivity),
            focal_length: display(Tag::FocalLength),
            orientation: display(Tag::Orientation),
        })
    }

    /// 加法启发式得分：
    /// 机型厂商 + 型号同时在场 40（只有其一 20），曝光 / ISO / 焦距各 10，
    /// 方向 5，GPS 15，拍摄时间 10。
    ///
    /// 逐项相加、不做显式钳制；八项信号全中恰为 100。
    pub fn score(&self) -> u32 {
        let mut score = match (&self.camera_make, &self.camera_model) {
            (Some(_), Some(_)) => 40,
            (Some(_), None) | (None, Some(_)) => 20,
            (None, None) => 0,
        };
        if self.exposure_time.is_some() {
            score += 10;
        }
        if self.iso.is_some() {
            score += 10;
        }
        if self.focal_length.is_some() {
            score += 10;
        }
        if self.has_gps {
            score += 15;
        }
        if self.captured_at.is_some() {
            score += 10;
        }
        if self.orientation.is_some() {
            score += 5;
        }
        score
    }

    /// 拼接找到的事实，供审核员肉眼核对
    fn details_line(&self) -> String {
        let mut parts = Vec::new();
        if let Some(make) = &self.camera_make {
            parts.push(format!("Camera: {make}"));
        }
        if let Some(model) = &self.camera_model {
            parts.push(model.clone());
        }
        if let Some(date) = &self.captured_at {
            parts.push(format!("Date: {date}"));
        }
        if self.has_gps {
            parts.push("GPS verified".to_string());
        }
        if parts.is_empty() {
            "No camera metadata".to_string()
        } else {
            parts.join(" | ")
        }
    }
}

/// 得分分档：≥70 Authentic（绿/高），30..=69 Uncertain（橙/中），<30 Suspicious（红/低）
pub fn score_facts(facts: &ExifFacts) -> ImageSubScore {
    let score = facts.score();
    let details = facts.details_line();

    let (label, color, confidence) = if score >= 70 {
        (
            format!("Authentic ({score}% metadata)"),
            GREEN,
            ConfidenceTier::High,
        )
    } else if score >= 30 {
        (
            format!("Uncertain ({score}% metadata)"),
            AMBER,
            ConfidenceTier::Medium,
        )
    } else {
        (
            format!("Suspicious ({score}% metadata)"),
            RED,
            ConfidenceTier::Low,
        )
    };

    ImageSubScore {
        score,
        label,
        color,
        confidence,
        details,
    }
}

/// 回退子评分：取图或解析失败时的本地恢复值
pub fn no_metadata_fallback() -> ImageSubScore {
    ImageSubScore {
        score: 0,
        label: "No metadata".to_string(),
        color: AMBER,
        confidence: ConfidenceTier::Low,
        details: "No EXIF data found".to_string(),
    }
}

/// 元数据通道入口：独立取图 → 解 EXIF → 打分；任何失败都就地降级
pub async fn analyze(http: &reqwest::Client, image_url: &str) -> ImageSubScore {
    match try_analyze(http, image_url).await {
        Ok(sub) => {
            println!("📷 元数据真实性得分: {}/100", sub.score);
            sub
        }
        Err(e) => {
            eprintln!("📷 元数据分析失败，降级为 No metadata: {e:#}");
            no_metadata_fallback()
        }
    }
}

async fn try_analyze(http: &reqwest::Client, image_url: &str) -> anyhow::Result<ImageSubScore> {
    let bytes = http
        .get(image_url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    let facts = ExifFacts::from_bytes(&bytes)?;
    Ok(score_facts(&facts))
}
