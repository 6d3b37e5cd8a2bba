use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::credentials::{CredentialCache, RpcCredentialProvider};
use crate::detector::{AiDetectorClient, DetectorTransport, DirectTransport, ProxiedTransport};
use crate::fusion;
use crate::metadata;
use crate::verdict::{FusedVerdict, ImageSubScore};

/// 模块：校验编排器 (VerificationOrchestrator)
///
/// 对一条投诉/事件记录的全部附件发起校验：每张图的元数据通道与 AI 通道
/// 并发执行（all-settled：任一路失败不中断另一路），两路就绪后交给融合器。
/// 附件之间互不协调、全部并行，单个附件的失败或 panic 不得拖垮其余附件。
/// 裁定每次请求现算，从不落库。

/// 一条附件引用：公开 URL + 内容类型（与门户附件记录字段对应）
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentRef {
    pub public_url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl AttachmentRef {
    /// 非图片附件完全绕过校验
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }
}

/// 单附件的校验结果
#[derive(Debug, Serialize)]
pub struct AttachmentReport {
    pub public_url: String,
    pub skipped: bool,
    pub verdict: Option<FusedVerdict>,
    pub verified_at: i64,
}

impl AttachmentReport {
    fn new(public_url: String, skipped: bool, verdict: Option<FusedVerdict>) -> Self {
        Self {
            public_url,
            skipped,
            verdict,
            verified_at: chrono::Utc::now().timestamp(),
        }
    }
}

pub struct Verifier {
    http: reqwest::Client,
    detector: AiDetectorClient,
}

impl Verifier {
    /// 按配置装配整条链：HTTP 客户端、凭据缓存、直连 + 代理双传输通道
    pub fn from_config(config: &Config) -> Self {
        let http = reqwest::Client::new();
        let provider = RpcCredentialProvider::new(
            http.clone(),
            config.credential_endpoint.clone(),
            config.credential_service.clone(),
        );
        let transports: Vec<Box<dyn DetectorTransport>> = vec![
            Box::new(DirectTransport::new(
                http.clone(),
                config.detector_endpoint.clone(),
            )),
            Box::new(ProxiedTransport::new(
                http.clone(),
                config.detector_endpoint.clone(),
                config.cors_proxy.clone(),
            )),
        ];
        let detector = AiDetectorClient::new(
            http.clone(),
            CredentialCache::new(Box::new(provider)),
            transports,
        );
        Self { http, detector }
    }

    /// 对一条记录的全部附件并行校验。附件间不设并发上限（接受的资源风险）。
    pub async fn verify_record(
        self: Arc<Self>,
        attachments: Vec<AttachmentRef>,
    ) -> Vec<AttachmentReport> {
        let (urls, handles): (Vec<_>, Vec<_>) = attachments
            .into_iter()
            .map(|att| {
                let verifier = Arc::clone(&self);
                let url = att.public_url.clone();
                let handle = tokio::spawn(async move {
                    if !att.is_image() {
                        return AttachmentReport::new(att.public_url, true, None);
                    }
                    let verdict = verifier.verify_attachment(&att.public_url).await;
                    AttachmentReport::new(att.public_url, false, Some(verdict))
                });
                (url, handle)
            })
            .unzip();

        urls.into_iter()
            .zip(join_all(handles).await)
            .map(|(url, joined)| settle_report(url, joined))
            .collect()
    }

    /// 单张图片：两路信号并发取值，全部落定后融合
    pub async fn verify_attachment(&self, image_url: &str) -> FusedVerdict {
        println!("🔬 开始双信号校验: {image_url}");
        let (meta, ai) = tokio::join!(
            metadata::analyze(&self.http, image_url),
            self.detector.analyze(image_url),
        );
        fuse_signals(Some(meta), ai)
    }
}

/// 单个附件任务 panic 只影响它自己：JoinError 映射为"校验不可用"哨兵，
/// 不向兄弟任务传播
fn settle_report(
    url: String,
    joined: Result<AttachmentReport, tokio::task::JoinError>,
) -> AttachmentReport {
    match joined {
        Ok(report) => report,
        Err(e) => {
            eprintln!("🧯 附件校验任务异常终止: {url}: {e}");
            AttachmentReport::new(url, false, Some(FusedVerdict::unavailable()))
        }
    }
}

/// 降级策略：双信号 → 融合；单信号 → 原样直通；零信号 → 显式哨兵
pub fn fuse_signals(
    meta: Option<ImageSubScore>,
    ai: Option<ImageSubScore>,
) -> FusedVerdict {
    match (meta, ai) {
        (Some(meta), Some(ai)) => fusion::fuse(&meta, &ai),
        (Some(single), None) | (None, Some(single)) => single.into(),
        (None, None) => FusedVerdict::unavailable(),
    }
}
