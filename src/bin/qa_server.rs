use delimit_qa::utils::{logger, validation::Validate};
use delimit_qa::QaConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    logger::init_server_logger();

    let config_path =
        std::env::var("DELIMIT_QA_CONFIG").unwrap_or_else(|_| "delimit-qa.toml".to_string());
    tracing::info!("Loading configuration from: {}", config_path);

    let config = QaConfig::load_or_default(&config_path)?;
    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code().max(1));
    }

    delimit_qa::server::serve(config).await?;
    Ok(())
}
