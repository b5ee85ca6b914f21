//! Binix Accel - browser acceleration backend
//!
//! Entry point for the HTTP server.

use binix_accel::metrics::spawn_sampler;
use binix_accel::{api, AppContext, ServerConfig, NAME, VERSION};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("{} failed: {}", NAME, e);
        std::process::exit(1);
    }
}

async fn run() -> binix_accel::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            log::warn!("ignoring .env: {}", e);
        }
    }

    let config = ServerConfig::from_env()?;
    let ctx = AppContext::build(config)?;

    let cancel = CancellationToken::new();
    let sampler = spawn_sampler(ctx.recorder.clone(), ctx.config.sample_interval, cancel.clone());

    let listener = TcpListener::bind(ctx.config.listen_addr).await?;
    log::info!("{} v{} listening on {}", NAME, VERSION, listener.local_addr()?);

    axum::serve(listener, api::router(ctx.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("shutting down");
    cancel.cancel();
    if let Err(e) = sampler.await {
        log::warn!("sampler task ended abnormally: {}", e);
    }

    let in_flight = ctx.orchestrator.in_flight();
    if !ctx.orchestrator.drain(ctx.config.drain_timeout).await {
        log::warn!(
            "{} background fetches still running after {:?}",
            ctx.orchestrator.in_flight(),
            ctx.config.drain_timeout
        );
    } else if in_flight > 0 {
        log::info!("drained {} background fetches", in_flight);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
