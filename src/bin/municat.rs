use clap::Parser;
use delimit_qa::utils::{logger, validation::Validate};
use delimit_qa::{MunicatGenerator, QaConfig, SqliteStore};

#[derive(Parser)]
#[command(name = "municat")]
#[command(about = "Build the municipal extract packages listed in the input CSV")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "delimit-qa.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let config = QaConfig::load_or_default(&args.config)?;
    config.validate()?;
    tracing::info!("Reading extract requests from {}", config.municat.input_csv.display());

    let store = SqliteStore::open(&config.paths.work_store)?;
    match MunicatGenerator::new(&config, store).run() {
        Ok(packages) => {
            for package in &packages {
                println!("{}", package.display());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_friendly_message());
            eprintln!("Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code().max(1));
        }
    }
}
