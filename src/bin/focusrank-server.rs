//! focusrank HTTP server binary

use focusrank::{server, FocusEngine, MockAdvisor, OpenAiAdvisor, RankingAdvisor, RankingConfig};
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "config/ranking_config.json";
const DEFAULT_PORT: u16 = 8082;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    println!("focusrank task ranking service");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    let config_path =
        std::env::var("RANKING_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = RankingConfig::load(&config_path);
    println!("✓ Config: {} (default mode '{}')", config_path, config.default_mode);

    let use_mock = std::env::args().any(|arg| arg == "--mock");
    let settings = config.reranking();

    let advisor: Option<Arc<dyn RankingAdvisor>> = if !settings.enabled {
        println!("✓ Advisory reranking: disabled");
        None
    } else if use_mock {
        println!("✓ Advisory reranking: MOCK advisor");
        Some(Arc::new(MockAdvisor))
    } else {
        let openai = OpenAiAdvisor::from_env(&settings, config.pricing.clone());
        if openai.is_available() {
            println!("✓ Advisory reranking: {} (limit ${:.2}/run)", settings.model, settings.cost_limit_per_run_usd);
        } else {
            eprintln!("⚠️  OPENAI_API_KEY not set, advisory reranking will fall back to base scores");
            eprintln!("   (use --mock for the offline advisor)");
        }
        Some(Arc::new(openai))
    };

    let port = match std::env::var("FOCUSRANK_PORT") {
        Ok(p) => p.parse()?,
        Err(_) => DEFAULT_PORT,
    };

    let engine = FocusEngine::new(config, advisor);

    println!("✓ Focus engine initialized");
    println!("✓ Starting HTTP server on port {}...", port);
    println!();

    server::run_server(engine, port).await?;

    Ok(())
}
