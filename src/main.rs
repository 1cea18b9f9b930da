use clap::Parser;
use delimit_qa::utils::{logger, validation::Validate};
use delimit_qa::{CliConfig, QaConfig, QaEngine, QaError, ShapefileSource, SqliteStore};

fn load_config(path: &str) -> delimit_qa::Result<QaConfig> {
    let config = QaConfig::load_or_default(path)?;
    config.validate()?;
    Ok(config)
}

fn fail(e: &QaError) -> ! {
    tracing::error!(
        "Quality check failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("{}", e.user_friendly_message());
    eprintln!("Suggestion: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code().max(1));
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose);
    tracing::info!("Starting delimit-qa for line {} ({})", cli.line_id, cli.line_type);
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    let store = match SqliteStore::open(&config.paths.work_store) {
        Ok(store) => store,
        Err(e) => fail(&e),
    };

    let engine = QaEngine::new(&config, ShapefileSource::new(), store);
    let response = engine.run(cli.line_id, cli.line_type);

    if cli.json {
        match serde_json::to_string_pretty(&response) {
            Ok(body) => println!("{}", body),
            Err(e) => fail(&QaError::from(e)),
        }
    } else {
        for entry in &response.reports {
            println!("{}: {}", entry.level, entry.report_message);
        }
        println!("{} {}", response.result, response.message);
    }

    if !response.is_ok() {
        std::process::exit(1);
    }
}
