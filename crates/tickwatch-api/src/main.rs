use std::net::SocketAddr;
use std::sync::Arc;

use tickwatch_api::{router, AppState};
use tickwatch_core::{Reconciler, ReqwestHttpClient, YahooProvider};
use tickwatch_store::StockStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = StockStore::open_default()?;
    info!(db_path = %store.db_path().display(), "store ready");

    let provider = YahooProvider::with_http_client(Arc::new(ReqwestHttpClient::new()));
    let reconciler = Reconciler::new(Arc::new(provider));
    let app = router(AppState::new(store, reconciler));

    let addr: SocketAddr = std::env::var("TICKWATCH_ADDR")
        .unwrap_or_else(|_| String::from("127.0.0.1:8080"))
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
