use clap::{Parser, Subcommand};
use delimit_qa::core::reference::{clear_store, update_reference_layers};
use delimit_qa::utils::{logger, validation::Validate};
use delimit_qa::{HttpReferenceSource, QaConfig, SqliteStore};

#[derive(Parser)]
#[command(name = "workdb")]
#[command(about = "Maintenance of the working geodata store")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "delimit-qa.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh the reference layers from the central database service
    Update,
    /// Drop every layer that is not listed as persistent
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let config = QaConfig::load_or_default(&args.config)?;
    if let Err(e) = config.validate() {
        eprintln!("{}", e.user_friendly_message());
        eprintln!("Suggestion: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code().max(1));
    }

    let store = SqliteStore::open(&config.paths.work_store)?;
    let outcome = match args.command {
        Command::Update => match HttpReferenceSource::new(&config.reference) {
            Ok(source) => update_reference_layers(&source, &store, &config.reference.layers).await,
            Err(e) => Err(e),
        },
        Command::Clear => clear_store(&store, &config.entities.persistent_layers),
    };

    match outcome {
        Ok(layers) => {
            println!("{} layers: {}", layers.len(), layers.join(", "));
            Ok(())
        }
        Err(e) => {
            tracing::error!("Working store maintenance failed: {}", e);
            eprintln!("{}", e.user_friendly_message());
            eprintln!("Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code().max(1));
        }
    }
}
