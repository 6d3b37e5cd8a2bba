use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// 托管二分类模型（AI 生成 vs 真实）的推理端点
    pub detector_endpoint: String,
    /// CORS 中继代理前缀，目标 URL 以 query 形式追加在其后
    pub cors_proxy: String,
    /// 托管后端的解密 API Key RPC 端点
    pub credential_endpoint: String,
    /// 凭据查询所用的固定服务标识
    pub credential_service: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("PORT must be a number"),
            detector_endpoint: env::var("DETECTOR_ENDPOINT").unwrap_or_else(|_| {
                "https://router.huggingface.co/hf-inference/models/Organika/sdxl-detector"
                    .to_string()
            }),
            cors_proxy: env::var("CORS_PROXY")
                .unwrap_or_else(|_| "https://api.allorigins.win/raw?url=".to_string()),
            credential_endpoint: env::var("CREDENTIAL_ENDPOINT").unwrap_or_else(|_| {
                "http://127.0.0.1:54321/rest/v1/rpc/get_decrypted_api_key".to_string()
            }),
            credential_service: env::var("CREDENTIAL_SERVICE")
                .unwrap_or_else(|_| "hugging_face".to_string()),
        }
    }
}
