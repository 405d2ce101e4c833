use anyhow::Result;
use sniffer_cli::{init_logging, list_interfaces, run, AppConfig, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbosity);

    match cli.command() {
        Commands::Interfaces => {
            list_interfaces();
            Ok(())
        }
        Commands::Run => {
            let mut config = AppConfig::load(&cli.config)?;
            config.apply_overrides(&cli);
            run(config).await.map(|_| ())
        }
    }
}
