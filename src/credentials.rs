use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

/// 模块：检测器凭据 (Detector Credential)
///
/// AI 检测端点要求 Bearer 凭据，由托管后端的解密 RPC 按服务名下发。
/// 凭据在校验器生命周期内只取一次（成功后缓存），避免反复触发特权查询。
/// 缓存显式归属于持有者，而不是模块级全局变量。

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<String>;
}

/// 经托管后端 RPC 取回解密后的服务 API Key
pub struct RpcCredentialProvider {
    http: reqwest::Client,
    endpoint: String,
    service: String,
}

impl RpcCredentialProvider {
    pub fn new(http: reqwest::Client, endpoint: String, service: String) -> Self {
        Self {
            http,
            endpoint,
            service,
        }
    }
}

#[async_trait]
impl CredentialProvider for RpcCredentialProvider {
    async fn fetch(&self) -> anyhow::Result<String> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "service": self.service }))
            .send()
            .await?
            .error_for_status()?;

        // RPC 响应体是一个 JSON 编码的字符串（解密后的 key 本身）
        let key: String = resp
            .json()
            .await
            .context("credential RPC did not return a string")?;
        anyhow::ensure!(!key.is_empty(), "credential RPC returned an empty key");
        Ok(key)
    }
}

/// 惰性初始化的凭据缓存：首次成功取回后在进程内复用；
/// 失败不落缓存，下一次调用会重新尝试。
pub struct CredentialCache {
    provider: Box<dyn CredentialProvider>,
    cached: Mutex<Option<String>>,
}

impl CredentialCache {
    pub fn new(provider: Box<dyn CredentialProvider>) -> Self {
        Self {
            provider,
            cached: Mutex::new(None),
        }
    }

    pub async fn bearer(&self) -> anyhow::Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }
        let key = self.provider.fetch().await?;
        *cached = Some(key.clone());
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        fail_first: bool,
    }

    #[async_trait]
    impl CredentialProvider for CountingProvider {
        async fn fetch(&self) -> anyhow::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                anyhow::bail!("rpc unavailable");
            }
            Ok("hf_test_key".to_string())
        }
    }

    #[tokio::test]
    async fn successful_fetch_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CredentialCache::new(Box::new(CountingProvider {
            calls: Arc::clone(&calls),
            fail_first: false,
        }));

        assert_eq!(cache.bearer().await.unwrap(), "hf_test_key");
        assert_eq!(cache.bearer().await.unwrap(), "hf_test_key");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CredentialCache::new(Box::new(CountingProvider {
            calls: Arc::clone(&calls),
            fail_first: true,
        }));

        assert!(cache.bearer().await.is_err());
        assert_eq!(cache.bearer().await.unwrap(), "hf_test_key");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
