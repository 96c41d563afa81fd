use awesome_blog::{app, default_indexes, ensure_tables, register_all, AppConfig, AppState, Pool, Templates};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("awesome_blog=info,tower_http=info")),
        )
        .init();

    let cfg = AppConfig::from_env()?;
    let metas = register_all()?;
    let pool = Pool::create(&cfg.db).await?;
    ensure_tables(&pool, &metas, &default_indexes()).await?;

    let state = AppState::new(
        pool.clone(),
        Arc::new(Templates::new(&cfg.template_dir)),
        &cfg.session_secret,
    );
    let router = app(state, &cfg.static_dir)?;

    let listener = TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("server started at http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    pool.close().await;
    Ok(())
}
