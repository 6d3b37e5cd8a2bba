use photoproof_core::api;
use photoproof_core::config::Config;
use photoproof_core::orchestrator::Verifier;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ----------------------------------------------------------------
    // 0. 加载配置
    // ----------------------------------------------------------------
    let config = Config::from_env();
    println!(
        "⚙️  配置加载完成: Host={}:{}, Detector={}",
        config.host, config.port, config.detector_endpoint
    );

    // ----------------------------------------------------------------
    // 1. 装配校验链（凭据缓存 + 双传输通道 + 融合器）
    // ----------------------------------------------------------------
    println!("🛡️ [鉴图 Photoproof] 附件真实性校验服务启动中...");
    let verifier = Arc::new(Verifier::from_config(&config));

    // ----------------------------------------------------------------
    // 2. 状态共享容器
    // ----------------------------------------------------------------
    let shared_state = Arc::new(api::AppState { verifier });

    // ----------------------------------------------------------------
    // 3. 启动 HTTP 服务
    // ----------------------------------------------------------------
    let app = api::app(shared_state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    println!("🚀 API 服务已运行在: http://{}", addr);
    println!("   - POST /verify  : 校验一条记录的全部附件");
    println!("   - POST /inspect : 校验单张图片");

    axum::serve(listener, app).await?;

    Ok(())
}
