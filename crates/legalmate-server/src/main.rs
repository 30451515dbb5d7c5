use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use legalmate_core::{
    config::Config,
    db::Db,
    engine::ReviewEngine,
    outcome::WeightedRandomDecider,
};
use legalmate_server::{build_router, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "legalmate_server=info,legalmate_core=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = format!("{}/legalmate.db", config.data_dir);
    let db = Db::open(&db_path)?;
    db.migrate()?;

    // First run seeds the tunables; operator edits to the config table win
    // over env defaults from then on.
    config.seed_db(&db)?;
    let config = Arc::new(config.load_from_db(&db));
    let db = Arc::new(db);

    let decider = Arc::new(WeightedRandomDecider::new(config.approve_probability));
    let engine = Arc::new(ReviewEngine::new(
        Arc::clone(&db),
        Arc::clone(&config),
        decider,
    ));

    // Sweep loop: fixed delay, so a slow tick never overlaps the next one.
    let tick_secs = config.sweep_interval_s;
    {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            loop {
                if engine.stopped() {
                    break;
                }
                if let Err(e) = engine.tick(Utc::now()) {
                    tracing::error!("sweep tick error: {e:#}");
                }
                tokio::time::sleep(tokio::time::Duration::from_secs(tick_secs)).await;
            }
        });
    }

    let state = Arc::new(AppState {
        db,
        engine: Arc::clone(&engine),
        start_time: Instant::now(),
    });
    let app = build_router(state);

    let addr = format!("{}:{}", config.web_bind, config.web_port);
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested, stopping sweeps");
            engine.stop.store(true, Ordering::Release);
        })
        .await?;

    Ok(())
}
