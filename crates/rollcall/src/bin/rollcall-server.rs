use rollcall::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), RollcallError> {
    // A missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    if config.teachers.is_empty() {
        tracing::warn!("no ROLLCALL_TEACHERS configured; teachers must register first");
    }
    let teachers = TeacherDirectory::with_teachers(config.teachers.clone());

    let server = RollcallServerBuilder::from_config(&config)
        .build(teachers, MemoryRecordStore::spawn())
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received");
        })
        .await
}
