use stowage_view::camera::Viewport;
use stowage_view::client::{HttpPlacementBackend, ServiceError};
use stowage_view::config::AppConfig;
use stowage_view::engine::{EngineOutputs, PlacementEngine};
use stowage_view::model::group_by_zone;
use stowage_view::render::{HeadlessRenderer, HeadlessSurface, RenderError};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum SessionError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("⚠️ Could not load .env: {}", err);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stowage_view=info")),
        )
        .init();

    let config = AppConfig::from_env();
    info!("🚀 Stowage view starting against {}", config.service.base_url());

    let local = tokio::task::LocalSet::new();
    if let Err(err) = local.run_until(run_session(config)).await {
        error!("❌ Session failed: {}", err);
        std::process::exit(1);
    }
}

async fn run_session(config: AppConfig) -> Result<(), SessionError> {
    let backend = HttpPlacementBackend::new(config.service.clone())?;
    let surface = HeadlessSurface::new(Viewport::new(
        config.view.viewport_width,
        config.view.viewport_height,
    ));
    let mut engine = PlacementEngine::new(backend, HeadlessRenderer::new(), surface, &config.view);
    engine.mount()?;

    engine.refresh();
    engine.settle().await;
    if let Some(err) = engine.preview().error() {
        warn!("⚠️ {}", err);
    }
    if engine.containers().is_empty() {
        warn!("⚠️ No containers available; nothing to show");
        engine.dispose();
        return Ok(());
    }

    for (zone, members) in group_by_zone(engine.containers()) {
        for container in members {
            info!(
                "{} / {}: {:.1}% used",
                zone,
                container.container_id,
                container.utilization_percent()
            );
        }
    }

    let container_id = config
        .session
        .container_id
        .clone()
        .or_else(|| engine.containers().first().map(|c| c.container_id.clone()));
    engine.view_container(container_id.as_deref());

    if let Some(item_id) = config.session.select_item.as_deref() {
        engine.select_item(Some(item_id));
        engine.settle().await;
    }

    let frames = u64::from(config.view.frame_rate);
    engine.run(frames).await?;
    log_outputs(&engine.outputs());

    if config.session.auto_confirm && engine.outputs().can_confirm {
        if engine.confirm() {
            engine.settle().await;
            engine.run(frames).await?;
        }
        log_outputs(&engine.outputs());
    }

    let stats = engine.render().renderer().stats();
    info!(
        "Rendered {} frames, {} GPU resources live",
        stats.frames, stats.live
    );
    engine.dispose();
    Ok(())
}

fn log_outputs(outputs: &EngineOutputs) {
    info!("Suggestion state: {:?}", outputs.suggestion);
    if outputs.can_confirm {
        info!("Placement can be confirmed");
    }
    if let Some(err) = &outputs.error {
        warn!("⚠️ {}", err);
    }
}
