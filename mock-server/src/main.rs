use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use pinboard_mock::MockConfig;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pinboard_mock=debug")),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;

    let config = MockConfig::default();
    tracing::info!(%addr, user = %config.user, token = %config.token, "Mock Pinboard API listening");
    pinboard_mock::run_with(listener, config).await
}
