//! Configuration commands.

use url::Url;

use crate::config::ClientSettings;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(settings: &ClientSettings) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(settings)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", ClientSettings::default_path().display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(settings: &ClientSettings) -> ClientResult<()> {
    check(settings)?;
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> ClientResult<()> {
    println!("config: {}", ClientSettings::default_path().display());
    Ok(())
}

fn check(settings: &ClientSettings) -> ClientResult<()> {
    Url::parse(&settings.api_base).map_err(|e| {
        ClientError::Config(format!("invalid api_base {:?}: {}", settings.api_base, e))
    })?;

    if !matches!(settings.scheme.as_str(), "ws" | "wss") {
        return Err(ClientError::Config(format!(
            "scheme must be ws or wss, got {:?}",
            settings.scheme
        )));
    }

    if let Some(ref credentials) = settings.credentials {
        if credentials.host_list()?.is_empty() {
            return Err(ClientError::Config(
                "credentials.hosts must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialSettings;

    #[test]
    fn default_settings_are_valid() {
        assert!(check(&ClientSettings::default()).is_ok());
    }

    #[test]
    fn rejects_bad_scheme() {
        let settings = ClientSettings {
            scheme: "http".into(),
            ..ClientSettings::default()
        };
        assert!(check(&settings).is_err());
    }

    #[test]
    fn rejects_empty_or_bad_hosts() {
        let mut settings = ClientSettings {
            credentials: Some(CredentialSettings {
                token: "t".into(),
                hosts: Vec::new(),
            }),
            ..ClientSettings::default()
        };
        assert!(check(&settings).is_err());

        settings.credentials = Some(CredentialSettings {
            token: "t".into(),
            hosts: vec!["no-port".into()],
        });
        assert!(check(&settings).is_err());
    }

    #[test]
    fn dump_serializes() {
        let settings = ClientSettings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        assert!(toml_str.contains("api_base = \"https://api.live.bilibili.com\""));
        assert!(toml_str.contains("[display]"));
    }
}
