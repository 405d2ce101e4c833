//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "sniffer")]
#[command(version, about = "Decode captured packets and ship them to a search index", long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(long, value_name = "PATH", default_value = "config.yml", global = true)]
    pub config: PathBuf,

    /// Network interface to capture on (overrides the config file)
    #[arg(short = 'i', long, global = true)]
    pub interface: Option<String>,

    /// BPF capture filter (overrides the config file)
    #[arg(short = 'f', long, value_name = "EXPRESSION", global = true)]
    pub filter: Option<String>,

    /// Log level (trace, debug, info, warn, error, fatal, panic)
    #[arg(
        short = 'v',
        long,
        value_name = "LEVEL",
        default_value = "warn",
        value_parser = parse_level,
        global = true
    )]
    pub verbosity: LevelFilter,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Capture and ship packets until interrupted (the default)
    Run,

    /// List available network interfaces
    Interfaces,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }
}

/// Accept tracing levels plus the `fatal`/`panic` spellings older configs use
fn parse_level(value: &str) -> Result<LevelFilter, String> {
    match value.to_ascii_lowercase().as_str() {
        "fatal" | "panic" => Ok(LevelFilter::ERROR),
        other => other
            .parse()
            .map_err(|_| format!("unknown log level '{}'", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["sniffer"]).unwrap();

        assert_eq!(cli.config, PathBuf::from("config.yml"));
        assert_eq!(cli.verbosity, LevelFilter::WARN);
        assert!(cli.interface.is_none());
        assert_eq!(cli.command(), Commands::Run);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "sniffer",
            "--config",
            "/etc/sniffer.yml",
            "-i",
            "eth1",
            "-f",
            "tcp port 443",
            "-v",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/sniffer.yml"));
        assert_eq!(cli.interface.as_deref(), Some("eth1"));
        assert_eq!(cli.filter.as_deref(), Some("tcp port 443"));
        assert_eq!(cli.verbosity, LevelFilter::DEBUG);
    }

    #[test]
    fn test_fatal_maps_to_error() {
        let cli = Cli::try_parse_from(["sniffer", "-v", "fatal"]).unwrap();
        assert_eq!(cli.verbosity, LevelFilter::ERROR);
    }

    #[test]
    fn test_unknown_level_rejected() {
        assert!(Cli::try_parse_from(["sniffer", "-v", "loud"]).is_err());
    }

    #[test]
    fn test_interfaces_subcommand() {
        let cli = Cli::try_parse_from(["sniffer", "interfaces"]).unwrap();
        assert_eq!(cli.command(), Commands::Interfaces);
    }
}
