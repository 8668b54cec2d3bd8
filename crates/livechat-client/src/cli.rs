//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::HostAddr;

/// livechat - Follow a live room's chat in your terminal
#[derive(Debug, Parser)]
#[command(name = "livechat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Room to join
    pub room_id: Option<u64>,

    /// Path to configuration file
    #[arg(long, short, env = "LIVECHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    // --- Output flags ---
    /// Prefix each line with the message time
    #[arg(long)]
    pub show_time: bool,

    /// Output JSON lines
    #[arg(long)]
    pub json: bool,

    /// Show messages whose command is not recognized
    #[arg(long)]
    pub emit_unknown: bool,

    // --- Connection flags ---
    /// Verify token (skips the credential API)
    #[arg(long, env = "LIVECHAT_TOKEN")]
    pub token: Option<String>,

    /// Broadcast host as host:port (can be repeated)
    #[arg(long = "host", action = clap::ArgAction::Append)]
    pub hosts: Vec<HostAddr>,

    /// Base URL of the credential API
    #[arg(long)]
    pub api_base: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Returns whether static credentials were given on the command line.
    pub fn has_static_credentials(&self) -> bool {
        self.token.is_some() || !self.hosts.is_empty()
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_and_flags() {
        let cli = Cli::try_parse_from([
            "livechat",
            "23058",
            "--show-time",
            "--host",
            "a.example:443",
            "--host",
            "b.example:2245",
            "--token",
            "abc",
        ])
        .unwrap();

        assert_eq!(cli.room_id, Some(23058));
        assert!(cli.show_time);
        assert!(!cli.json);
        assert_eq!(
            cli.hosts,
            vec![HostAddr::new("a.example", 443), HostAddr::new("b.example", 2245)]
        );
        assert!(cli.has_static_credentials());
        assert!(cli.command.is_none());
    }

    #[test]
    fn bad_host_is_rejected() {
        assert!(Cli::try_parse_from(["livechat", "1", "--host", "nope"]).is_err());
    }

    #[test]
    fn config_subcommand() {
        let cli = Cli::try_parse_from(["livechat", "config", "path"]).unwrap();
        assert!(cli.room_id.is_none());
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                action: ConfigAction::Path
            })
        ));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
