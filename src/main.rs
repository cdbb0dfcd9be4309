//! EDGECOACH — AI Trading Psychology Coach
//!
//! Entry point. Loads configuration, initialises structured logging,
//! selects the LLM provider, and serves the rewrite API with graceful
//! shutdown.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use edgecoach::config;
use edgecoach::llm::anthropic::AnthropicClient;
use edgecoach::llm::openrouter::OpenRouterClient;
use edgecoach::llm::ModelDispatcher;
use edgecoach::server;
use edgecoach::server::routes::ServiceState;

const BANNER: &str = r#"
 _____ ____   ____ _____ ____ ___    _    ____ _   _
| ____|  _ \ / ___| ____/ ___/ _ \  / \  / ___| | | |
|  _| | | | | |  _|  _|| |  | | | |/ _ \| |   | |_| |
| |___| |_| | |_| | |__| |__| |_| / ___ \ |___|  _  |
|_____|____/ \____|_____\____\___/_/   \_\____|_| |_|

  AI Trading Psychology Coach — Memory Rewrite Service
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        host = %cfg.server.host,
        port = cfg.server.port,
        provider = %cfg.llm.provider,
        model = %cfg.llm.model,
        "EDGECOACH starting up"
    );

    // -- LLM dispatcher ---------------------------------------------------

    let api_key = std::env::var(&cfg.llm.api_key_env).unwrap_or_default();
    if api_key.is_empty() {
        warn!(
            env = %cfg.llm.api_key_env,
            "No LLM API key configured — rewrite requests will fail upstream"
        );
    }

    let dispatcher: Arc<dyn ModelDispatcher> = match cfg.llm.provider.as_str() {
        "anthropic" => {
            info!(model = %cfg.llm.model, "Using Anthropic LLM provider");
            Arc::new(AnthropicClient::new(
                api_key,
                Some(cfg.llm.model.clone()),
                Some(cfg.llm.max_tokens),
            )?)
        }
        "openrouter" => {
            info!(
                model = %cfg.llm.model,
                fallback = ?cfg.llm.fallback_model,
                "Using OpenRouter LLM provider"
            );
            Arc::new(OpenRouterClient::new(
                api_key,
                Some(cfg.llm.model.clone()),
                cfg.llm.fallback_model.clone(),
                Some(cfg.llm.max_tokens),
            )?)
        }
        other => {
            warn!(provider = other, "Unknown LLM provider, defaulting to OpenRouter");
            Arc::new(OpenRouterClient::new(
                api_key,
                Some(cfg.llm.model.clone()),
                cfg.llm.fallback_model.clone(),
                Some(cfg.llm.max_tokens),
            )?)
        }
    };

    // -- HTTP server ------------------------------------------------------

    let state = Arc::new(ServiceState::new(dispatcher, cfg.llm.model.clone()));
    server::serve(state, &cfg.server.host, cfg.server.port).await?;

    info!("EDGECOACH shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("edgecoach=info"));

    let json_logging = std::env::var("EDGECOACH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
