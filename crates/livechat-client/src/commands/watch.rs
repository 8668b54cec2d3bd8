//! Follow a room and print its chat.

use livechat_core::{FormatOptions, LineFormatter, OutputFormat};
use livechat_protocol::UnknownCommandPolicy;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::Cli;
use crate::config::{ClientSettings, HostAddr};
use crate::connection::{ConnectionManager, ManagerSettings};
use crate::credentials::{
    CredentialSource, DEFAULT_LOOKUP_TIMEOUT, HttpCredentialSource, StaticCredentials,
};
use crate::error::{ClientError, ClientResult};
use crate::signals;
use crate::transport::WsConnector;

/// Events buffered between the receive loop and stdout.
const EVENT_BUFFER: usize = 256;

/// Joins `room_id` and prints one line per event until closed.
pub async fn run(room_id: u64, cli: &Cli, settings: &ClientSettings) -> ClientResult<()> {
    let source = credential_source(cli, settings)?;
    let config = source.lookup(room_id).await?;
    info!(room_id, hosts = config.host_list.len(), "credentials loaded");

    let policy = if cli.emit_unknown {
        UnknownCommandPolicy::Emit
    } else {
        UnknownCommandPolicy::Drop
    };
    let manager_settings = ManagerSettings::default()
        .with_scheme(settings.scheme.clone())
        .with_unknown_commands(policy);

    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
    let manager = ConnectionManager::new(config, WsConnector::new(), tx).with_settings(manager_settings);
    signals::spawn_listener(manager.close_handle());
    let task = tokio::spawn(manager.run());

    let formatter = LineFormatter::new(format_options(cli, settings));
    while let Some(event) = rx.recv().await {
        if let Some(line) = formatter.format(&event) {
            println!("{}", line);
        }
    }

    task.await
        .map_err(|e| ClientError::Connection(format!("connection task failed: {}", e)))?
}

/// Builds output options from flags and file settings.
pub fn format_options(cli: &Cli, settings: &ClientSettings) -> FormatOptions {
    let format = if cli.json || settings.display.json {
        OutputFormat::Json
    } else {
        OutputFormat::Tty
    };
    FormatOptions::default()
        .with_format(format)
        .with_show_time(cli.show_time || settings.display.show_time)
        .with_show_unrecognized(cli.emit_unknown)
}

/// Picks the credential source: flags, then the config file, then the API.
pub fn credential_source(
    cli: &Cli,
    settings: &ClientSettings,
) -> ClientResult<Box<dyn CredentialSource>> {
    let file = settings.credentials.as_ref();

    if cli.has_static_credentials() {
        let token = cli
            .token
            .clone()
            .or_else(|| file.map(|c| c.token.clone()))
            .unwrap_or_default();
        let hosts: Vec<HostAddr> = if cli.hosts.is_empty() {
            file.map(|c| c.host_list()).transpose()?.unwrap_or_default()
        } else {
            cli.hosts.clone()
        };
        if hosts.is_empty() {
            return Err(ClientError::Config(
                "--token needs at least one --host".to_string(),
            ));
        }
        return Ok(Box::new(StaticCredentials::new(token, hosts)));
    }

    if let Some(credentials) = file {
        return Ok(Box::new(StaticCredentials::new(
            credentials.token.clone(),
            credentials.host_list()?,
        )));
    }

    let api_base = cli.api_base.as_deref().unwrap_or(&settings.api_base);
    Ok(Box::new(HttpCredentialSource::new(
        api_base,
        DEFAULT_LOOKUP_TIMEOUT,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialSettings;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("livechat").chain(args.iter().copied())).unwrap()
    }

    fn file_credentials() -> ClientSettings {
        ClientSettings {
            credentials: Some(CredentialSettings {
                token: "from-file".into(),
                hosts: vec!["file.example:443".into()],
            }),
            ..ClientSettings::default()
        }
    }

    #[tokio::test]
    async fn flags_win_over_file() {
        let source = credential_source(
            &cli(&["1", "--token", "flag", "--host", "flag.example:2245"]),
            &file_credentials(),
        )
        .unwrap();
        let config = source.lookup(1).await.unwrap();
        assert_eq!(config.auth_token, "flag");
        assert_eq!(config.host_list, vec![HostAddr::new("flag.example", 2245)]);
    }

    #[tokio::test]
    async fn token_flag_reuses_file_hosts() {
        let source =
            credential_source(&cli(&["1", "--token", "flag"]), &file_credentials()).unwrap();
        let config = source.lookup(1).await.unwrap();
        assert_eq!(config.auth_token, "flag");
        assert_eq!(config.host_list, vec![HostAddr::new("file.example", 443)]);
    }

    #[tokio::test]
    async fn file_credentials_used_without_flags() {
        let source = credential_source(&cli(&["1"]), &file_credentials()).unwrap();
        let config = source.lookup(5).await.unwrap();
        assert_eq!(config.auth_token, "from-file");
        assert_eq!(config.room_id, 5);
    }

    #[test]
    fn token_without_hosts_is_an_error() {
        let result = credential_source(&cli(&["1", "--token", "t"]), &ClientSettings::default());
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn falls_back_to_http() {
        assert!(credential_source(&cli(&["1"]), &ClientSettings::default()).is_ok());
        assert!(
            credential_source(&cli(&["1", "--api-base", "::bad"]), &ClientSettings::default())
                .is_err()
        );
    }

    #[test]
    fn output_options_merge_flags_and_file() {
        let mut settings = ClientSettings::default();
        settings.display.show_time = true;

        let options = format_options(&cli(&["1", "--json", "--emit-unknown"]), &settings);
        assert_eq!(options.output_format, OutputFormat::Json);
        assert!(options.show_time);
        assert!(options.show_unrecognized);

        let options = format_options(&cli(&["1"]), &ClientSettings::default());
        assert_eq!(options.output_format, OutputFormat::Tty);
        assert!(!options.show_time);
    }
}
