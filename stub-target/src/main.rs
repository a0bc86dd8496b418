use anyhow::Context;
use tracing::info;
use volley_test_util::{router, HitCounter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("stub_target=info")
        .init();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let _g = rt.enter();
    rt.block_on(run_server())
}

async fn run_server() -> anyhow::Result<()> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let counter = HitCounter::new();
    info!("Stub target listening on {}", listener.local_addr()?);
    axum::serve(listener, router(counter))
        .await
        .context("Stub target server failed")
}
