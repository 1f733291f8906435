use anyhow::{bail, Context, Result};
use avatar_stage::config::Config;
use avatar_stage::credential::{CredentialClient, CredentialSource, StaticCredential};
use avatar_stage::http::{create_router, AppState, SESSION_TOKEN_PATH};
use avatar_stage::remote::LoopbackAvatarService;
use avatar_stage::render::{HeadlessSurface, RenderLoop};
use avatar_stage::session::{Script, SessionController, SessionState};
use avatar_stage::{EffectConfig, EventLog};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "avatar-stage", version, about = "Drive a streaming virtual presenter")]
struct Cli {
    /// Configuration file, with or without extension
    #[arg(short, long, default_value = "config/avatar-stage")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the credential boundary endpoint
    Serve,

    /// Run one presenter session against the loopback avatar service
    Present {
        /// Text to speak once the stream is ready (defaults to the configured script)
        #[arg(long)]
        script: Option<String>,

        /// Seconds to keep the session open
        #[arg(long, default_value_t = 15)]
        seconds: u64,

        /// Use this token instead of calling the credential endpoint
        #[arg(long)]
        token: Option<String>,

        /// Show raw video instead of removing the green background
        #[arg(long)]
        no_effect: bool,

        /// Override the chroma-key threshold
        #[arg(long)]
        threshold: Option<u8>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve => serve(&cfg).await,
        Command::Present {
            script,
            seconds,
            token,
            no_effect,
            threshold,
        } => {
            let mut effect = cfg.effect;
            if no_effect {
                effect.enabled = false;
            }
            if let Some(threshold) = threshold {
                effect.threshold = threshold;
            }
            present(&cfg, script, Duration::from_secs(seconds), token, effect).await
        }
    }
}

async fn serve(cfg: &Config) -> Result<()> {
    let state = AppState::from_env(&cfg.credential);
    if state.secret.is_none() {
        warn!(
            "{} is not set; token requests will be refused",
            cfg.credential.secret_env
        );
    }

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Credential endpoint listening on http://{}{}", addr, SESSION_TOKEN_PATH);

    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn present(
    cfg: &Config,
    script: Option<String>,
    duration: Duration,
    token: Option<String>,
    effect: EffectConfig,
) -> Result<()> {
    let log = EventLog::new(cfg.log.capacity);

    let credentials: Arc<dyn CredentialSource> = match token {
        Some(token) => Arc::new(StaticCredential(token)),
        None => Arc::new(CredentialClient::new(cfg.credential.endpoint.clone())),
    };
    let service = Arc::new(LoopbackAvatarService::default());

    let (controller, handle) =
        SessionController::new(cfg.session_config(), credentials, service, log.clone());
    let controller_task = controller.spawn();

    let (effect_tx, effect_rx) = watch::channel(effect);
    let render = RenderLoop::new(
        HeadlessSurface::default(),
        handle.subscribe(),
        effect_rx,
        cfg.frame_interval(),
    );
    let render_task = tokio::spawn(render.run());

    let script = script.or_else(|| cfg.session.script.clone());
    if let Some(text) = &script {
        let stats = Script::new(text.as_str());
        info!(
            "Script: {} words | ~{} seconds",
            stats.word_count(),
            stats.estimated_duration().as_secs()
        );
    }

    handle.start(script).await?;
    let snapshot = handle
        .wait_for(|s| s.state.has_video() || s.state.is_idle())
        .await?;
    if snapshot.state.is_idle() {
        bail!(
            "Session failed to start: {}",
            snapshot.last_error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    tokio::select! {
        _ = sleep(duration) => {}
        _ = handle.wait_for_state(SessionState::Idle) => warn!("Session ended by the remote side"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    if handle.state().has_video() {
        if let Err(e) = handle.stop().await {
            warn!("Session stop reported: {}", e);
        }
    }

    drop(handle);
    controller_task.await.context("Session controller task failed")?;
    drop(effect_tx);
    let render = render_task.await.context("Render task failed")?;

    info!(
        "Presented {} composited frames",
        render.surface().frames_presented()
    );
    println!("Event log:");
    for line in log.lines() {
        println!("  {}", line);
    }

    Ok(())
}
