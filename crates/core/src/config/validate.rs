use super::{types::ClientBackend, types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - The selected client backend has its section filled in
/// - Retry/background tunables are non-degenerate
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    match config.client {
        ClientBackend::Qbittorrent => {
            let Some(qbit) = &config.qbittorrent else {
                return Err(ConfigError::Invalid(
                    "client = \"qbittorrent\" requires a [qbittorrent] section".to_string(),
                ));
            };
            if qbit.retry.max_attempts == 0 {
                return Err(ConfigError::Invalid(
                    "qbittorrent.retry.max_attempts must be at least 1".to_string(),
                ));
            }
            if qbit.background.max_workers == 0 {
                return Err(ConfigError::Invalid(
                    "qbittorrent.background.max_workers must be at least 1".to_string(),
                ));
            }
        }
        ClientBackend::Transmission => {
            let Some(transmission) = &config.transmission else {
                return Err(ConfigError::Invalid(
                    "client = \"transmission\" requires a [transmission] section".to_string(),
                ));
            };
            if transmission.retry.max_attempts == 0 {
                return Err(ConfigError::Invalid(
                    "transmission.retry.max_attempts must be at least 1".to_string(),
                ));
            }
        }
    }

    if config.lifecycle.settle_delay_secs < 0.0 {
        return Err(ConfigError::Invalid(
            "lifecycle.settle_delay_secs cannot be negative".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_validate_valid_config() {
        let config = load_config_from_str(
            r#"
client = "qbittorrent"

[qbittorrent]
url = "http://localhost:8080"
username = "admin"
password = "adminadmin"
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_missing_backend_section() {
        let config = load_config_from_str(r#"client = "transmission""#).unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("[transmission]"));
    }

    #[test]
    fn test_validate_zero_attempts() {
        let config = load_config_from_str(
            r#"
client = "qbittorrent"

[qbittorrent]
url = "http://localhost:8080"
username = "admin"
password = "adminadmin"

[qbittorrent.retry]
max_attempts = 0
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_workers() {
        let config = load_config_from_str(
            r#"
client = "qbittorrent"

[qbittorrent]
url = "http://localhost:8080"
username = "admin"
password = "adminadmin"

[qbittorrent.background]
max_workers = 0
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());
    }
}
