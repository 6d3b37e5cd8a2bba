use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::orchestrator::{AttachmentRef, AttachmentReport, Verifier};
use crate::verdict::FusedVerdict;

// ==========================================
// 1. 定义应用状态 (Shared State)
// ==========================================
// 校验器内部自带凭据缓存（Mutex 保护），整体只读共享即可。
pub struct AppState {
    pub verifier: Arc<Verifier>,
}

// ==========================================
// 2. 数据传输对象 (DTOs)
// ==========================================

// 请求：一条投诉/事件记录的全部附件
#[derive(Deserialize)]
pub struct VerifyRequest {
    pub attachments: Vec<AttachmentRef>,
}

// 响应：逐附件的裁定（非图片附件标记 skipped）
#[derive(Serialize)]
pub struct VerifyResponse {
    pub results: Vec<AttachmentReport>,
}

// 请求：单张图片即席校验
#[derive(Deserialize)]
pub struct InspectRequest {
    pub public_url: String,
}

// ==========================================
// 3. API 路由构建
// ==========================================
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/verify", post(verify_record))
        .route("/inspect", post(inspect_image))
        .layer(CorsLayer::permissive()) // ⚠️ 开发模式：允许所有跨域
        .with_state(state)
}

// ==========================================
// 4. 处理函数 (Handlers)
// ==========================================

/// 接口：校验一条记录的全部附件
async fn verify_record(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, (StatusCode, String)> {
    if req.attachments.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "attachments must not be empty".to_string(),
        ));
    }

    println!("📥 收到校验请求: {} 个附件", req.attachments.len());
    let results = Arc::clone(&state.verifier)
        .verify_record(req.attachments)
        .await;
    println!("✅ 校验完成: {} 个结果", results.len());

    Ok(Json(VerifyResponse { results }))
}

/// 接口：单张图片即席校验
async fn inspect_image(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InspectRequest>,
) -> Json<FusedVerdict> {
    println!("🔍 收到单图校验请求: {}", req.public_url);
    Json(state.verifier.verify_attachment(&req.public_url).await)
}
