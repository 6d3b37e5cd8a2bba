use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use crate::credentials::CredentialCache;
use crate::verdict::{ConfidenceTier, ImageSubScore, AMBER, GREEN, RED};

/// 模块：AI 检测客户端 (AIDetectorClient)
///
/// **职责**: 把图片字节送往外部托管的二分类模型（AI 生成 vs 真实），
/// 并把输出归一化为 0..100 的 "AI 生成概率" 子评分。
///
/// **传输责任链**: 先走直连通道（原始字节体），失败再经 CORS 中继代理
/// （base64 data URI 的 JSON 体）。每环独立成败，按序尝试。
///
/// **失败语义**: 网络 / 鉴权 / 解析错误一律折叠为 None（"信号不可用"），
/// 绝不向调用方抛出；模型冷启动单独呈现为 loading 档位的临时子评分。

/// 分类器返回的一条 {label, score}；score ∈ [0,1]
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationEntry {
    pub label: String,
    pub score: f64,
}

/// 非 2xx 响应体；error 文案含 "loading" 即为模型冷启动
#[derive(Debug, Deserialize)]
struct DetectorErrorBody {
    error: String,
    estimated_time: Option<f64>,
}

/// 传输层一次调用的结果
#[derive(Debug)]
pub enum DetectorReply {
    Scores(Vec<ClassificationEntry>),
    Loading { estimated_time: f64 },
}

/// 已取回的图片字节及其 MIME 类型（代理通道拼 data URI 时需要）
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// 传输策略接口：责任链中的一环
#[async_trait]
pub trait DetectorTransport: Send + Sync {
    fn name(&self) -> &'static str;
    async fn classify(&self, bearer: &str, image: &FetchedImage)
        -> anyhow::Result<DetectorReply>;
}

/// 通道 A：把原始图片字节直接 POST 给模型端点
pub struct DirectTransport {
    http: reqwest::Client,
    endpoint: String,
}

impl DirectTransport {
    pub fn new(http: reqwest::Client, endpoint: String) -> Self {
        Self { http, endpoint }
    }
}

#[async_trait]
impl DetectorTransport for DirectTransport {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn classify(
        &self,
        bearer: &str,
        image: &FetchedImage,
    ) -> anyhow::Result<DetectorReply> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(bearer)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.bytes.clone())
            .send()
            .await?;
        parse_reply(resp).await
    }
}

/// 通道 B：经 CORS 中继代理转发，负载为 base64 data URI 的 JSON。
/// 代理依赖被隔离在这一环里，按部署可整条移除或替换。
pub struct ProxiedTransport {
    http: reqwest::Client,
    endpoint: String,
    proxy_prefix: String,
}

impl ProxiedTransport {
    pub fn new(http: reqwest::Client, endpoint: String, proxy_prefix: String) -> Self {
        Self {
            http,
            endpoint,
            proxy_prefix,
        }
    }
}

#[async_trait]
impl DetectorTransport for ProxiedTransport {
    fn name(&self) -> &'static str {
        "cors-proxy"
    }

    async fn classify(
        &self,
        bearer: &str,
        image: &FetchedImage,
    ) -> anyhow::Result<DetectorReply> {
        let encoded: String = url::form_urlencoded::byte_serialize(self.endpoint.as_bytes()).collect();
        let proxied = format!("{}{}", self.proxy_prefix, encoded);
        let data_uri = format!(
            "data:{};base64,{}",
            image.content_type,
            base64::engine::general_purpose::STANDARD.encode(&image.bytes)
        );

        let resp = self
            .http
            .post(&proxied)
            .bearer_auth(bearer)
            .json(&serde_json::json!({ "inputs": data_uri }))
            .send()
            .await?;
        parse_reply(resp).await
    }
}

/// 解析端点响应：2xx → 分类数组；非 2xx → 先识别冷启动，再归为错误
async fn parse_reply(resp: reqwest::Response) -> anyhow::Result<DetectorReply> {
    let status = resp.status();
    if status.is_success() {
        let entries: Vec<ClassificationEntry> = resp
            .json()
            .await
            .context("detector response is not a classification array")?;
        return Ok(DetectorReply::Scores(entries));
    }

    let body = resp.text().await.unwrap_or_default();
    if let Some(estimated_time) = loading_from_error_body(&body) {
        return Ok(DetectorReply::Loading { estimated_time });
    }
    anyhow::bail!("detector endpoint returned {status}: {body}")
}

fn loading_from_error_body(body: &str) -> Option<f64> {
    let err: DetectorErrorBody = serde_json::from_str(body).ok()?;
    if err.error.contains("loading") {
        Some(err.estimated_time.unwrap_or(20.0))
    } else {
        None
    }
}

// 已知模型的标签词汇表，集中成映射表而不是散落的子串判断：
// 命中 artificial 侧 → 直接取 score 为 AI 生成概率
// 仅命中 real 侧    → 取 1 - score
// 都未命中          → 按 0 处理（无法识别的词汇不贡献信号）
const ARTIFICIAL_LABELS: &[&str] = &["artificial", "fake", "ai", "generated"];
const REAL_LABELS: &[&str] = &["real", "human"];

fn label_matches(label: &str, vocabulary: &[&str]) -> bool {
    let label = label.to_lowercase();
    vocabulary.iter().any(|word| label.contains(word))
}

/// 从分类数组提取 AI 生成概率（0.0..1.0）
pub fn ai_probability(entries: &[ClassificationEntry]) -> f64 {
    if let Some(e) = entries
        .iter()
        .find(|e| label_matches(&e.label, ARTIFICIAL_LABELS))
    {
        e.score
    } else if let Some(e) = entries.iter().find(|e| label_matches(&e.label, REAL_LABELS)) {
        1.0 - e.score
    } else {
        0.0
    }
}

/// 概率分档：<0.3 Real Photo（绿/高），<0.7 Uncertain（橙/中），
/// 其余 AI-Generated（红/高）。`score` 字段恒存 AI 概率的整数百分比。
pub fn sub_score_from_probability(probability: f64) -> ImageSubScore {
    let ai_pct = (probability * 100.0).round() as u32;
    let real_pct = 100u32.saturating_sub(ai_pct);

    if probability < 0.3 {
        ImageSubScore {
            score: ai_pct,
            label: format!("Real Photo ({real_pct}% confidence)"),
            color: GREEN,
            confidence: ConfidenceTier::High,
            details: format!("AI probability: {ai_pct}%"),
        }
    } else if probability < 0.7 {
        ImageSubScore {
            score: ai_pct,
            label: format!("Uncertain ({ai_pct}% AI probability)"),
            color: AMBER,
            confidence: ConfidenceTier::Medium,
            details: "Mixed signals detected".to_string(),
        }
    } else {
        ImageSubScore {
            score: ai_pct,
            label: format!("AI-Generated ({ai_pct}% confidence)"),
            color: RED,
            confidence: ConfidenceTier::High,
            details: "Strong AI signature".to_string(),
        }
    }
}

/// 冷启动临时态：不算失败，提示审核员稍后刷新
pub fn loading_sub_score(estimated_time: f64) -> ImageSubScore {
    let secs = estimated_time.ceil() as u64;
    ImageSubScore {
        score: 0,
        label: format!("AI Model Loading... retry in {secs}s"),
        color: AMBER,
        confidence: ConfidenceTier::Loading,
        details: "Model is initializing, please wait".to_string(),
    }
}

pub struct AiDetectorClient {
    http: reqwest::Client,
    credentials: CredentialCache,
    transports: Vec<Box<dyn DetectorTransport>>,
}

impl AiDetectorClient {
    pub fn new(
        http: reqwest::Client,
        credentials: CredentialCache,
        transports: Vec<Box<dyn DetectorTransport>>,
    ) -> Self {
        Self {
            http,
            credentials,
            transports,
        }
    }

    /// AI 通道入口：任何不可恢复失败 → None（调用方理解为"信号不可用"，
    /// 而不是 0 分）
    pub async fn analyze(&self, image_url: &str) -> Option<ImageSubScore> {
        match self.try_analyze(image_url).await {
            Ok(sub) => Some(sub),
            Err(e) => {
                eprintln!("🤖 AI 检测通道失败，信号不可用: {e:#}");
                None
            }
        }
    }

    async fn try_analyze(&self, image_url: &str) -> anyhow::Result<ImageSubScore> {
        let bearer = self
            .credentials
            .bearer()
            .await
            .context("unable to retrieve detector credential")?;
        let image = self.fetch_image(image_url).await?;
        println!("🤖 图片已取回: {} bytes，开始送检", image.bytes.len());
        self.classify_image(&bearer, &image).await
    }

    /// 按序走完传输责任链；任一环产出结果即停
    async fn classify_image(
        &self,
        bearer: &str,
        image: &FetchedImage,
    ) -> anyhow::Result<ImageSubScore> {
        let mut last_err = anyhow::anyhow!("no detector transport configured");
        for transport in &self.transports {
            match transport.classify(bearer, image).await {
                Ok(DetectorReply::Scores(entries)) => {
                    return Ok(sub_score_from_probability(ai_probability(&entries)));
                }
                Ok(DetectorReply::Loading { estimated_time }) => {
                    return Ok(loading_sub_score(estimated_time));
                }
                Err(e) => {
                    eprintln!("🤖 传输通道 {} 失败，尝试下一条: {e:#}", transport.name());
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    async fn fetch_image(&self, image_url: &str) -> anyhow::Result<FetchedImage> {
        let resp = self
            .http
            .get(image_url)
            .send()
            .await?
            .error_for_status()?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = resp.bytes().await?.to_vec();
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}
