use anyhow::Context;
use delve::{
    AppState, DelveConfig, DelveConfigManager, ResearchOrchestrator,
    api,
    cli::{
        Cli, Commands, commands,
        init::{self, InitConfig, InitResult},
        output::Output,
    },
    research::RunState,
    utils::toml_config::LogFormat,
};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Init {
            path,
            force,
            provider,
            backend,
            host,
            port,
        } => {
            let config = InitConfig {
                path,
                force,
                provider,
                backend,
                host,
                port,
            };
            match init::run(config, &output) {
                InitResult::Success | InitResult::AlreadyExists => Ok(()),
                InitResult::Error(e) => anyhow::bail!("init failed: {}", e),
            }
        }
        Commands::Research {
            query,
            backend,
            json,
        } => {
            let manager = prepare(&cli.config, cli.verbose, &output)?;
            let run =
                commands::research(&manager.config(), &query.join(" "), backend, json, &output)
                    .await?;
            if run.state != RunState::Completed {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Config { validate } => {
            let manager = prepare(&cli.config, cli.verbose, &output)?;
            commands::show_config(&manager, validate, &output)?;
            Ok(())
        }
        Commands::Serve => serve(prepare(&cli.config, cli.verbose, &output)?).await,
    }
}

/// Load configuration and install the tracing subscriber it describes.
fn prepare(path: &Path, verbose: bool, output: &Output) -> anyhow::Result<DelveConfigManager> {
    let manager = load_config(path, output)?;
    init_tracing(&manager.config(), verbose);
    Ok(manager)
}

/// The default config path may be absent (built-in defaults apply); an
/// explicitly named file must exist.
fn load_config(path: &Path, output: &Output) -> anyhow::Result<DelveConfigManager> {
    if !path.exists() && path == Path::new("delve.toml") {
        output.warning("delve.toml not found, using built-in defaults (run `delve init` to create one)");
        return Ok(DelveConfigManager::from_config(DelveConfig::default()));
    }
    DelveConfigManager::new(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

fn init_tracing(config: &DelveConfig, verbose: bool) {
    let default_filter = if verbose {
        "debug".to_string()
    } else {
        format!("{},tower_http=info", config.server.log_level)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Logs go to stderr; stdout carries reports and `--json` output.
    let registry = tracing_subscriber::registry().with(filter);
    match config.server.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn serve(manager: DelveConfigManager) -> anyhow::Result<()> {
    let config = manager.config();
    let orchestrator = Arc::new(
        ResearchOrchestrator::from_config(&config)
            .await
            .context("failed to set up the research pipeline")?,
    );

    if manager.path().is_some()
        && let Err(e) = manager.start_watching()
    {
        tracing::warn!(error = %e, "Config hot reload disabled");
    }

    let state = AppState::new(Arc::new(manager), orchestrator);
    let active_runs = Arc::clone(&state.active_runs);
    let app = api::build_app(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Delve listening on http://{}", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let cancelled = active_runs.cancel_all();
            if cancelled > 0 {
                tracing::info!(runs = cancelled, "Cancelled research runs in flight");
            }
        })
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
