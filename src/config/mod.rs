use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub cache: CacheConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("TALLY_API_CONFIG").unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("TALLY_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        assert!(
            !self.database.url.is_empty(),
            "Database URL must be specified"
        );
        assert!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        self.ledger.ensure_bounds()?;
        self.cache.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Fixed UTC offset of the deployment's reference time zone, in minutes.
    /// Period boundaries (day/week/month starts) are computed in this offset.
    #[serde(default)]
    pub timezone_offset_minutes: i32,
}

impl LedgerConfig {
    pub fn reference_offset(&self) -> FixedOffset {
        self.ensure_bounds().expect("offset validated at load time");
        FixedOffset::east_opt(self.timezone_offset_minutes * 60)
            .expect("bounded offset is always valid")
    }

    pub fn ensure_bounds(&self) -> Result<()> {
        // Real-world UTC offsets span -12:00 to +14:00.
        assert!(
            self.timezone_offset_minutes >= -720,
            "Timezone offset below -12:00"
        );
        assert!(
            self.timezone_offset_minutes <= 840,
            "Timezone offset above +14:00"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub rankings_max_capacity: u64,
    pub rankings_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.rankings_max_capacity >= 10,
            "Ranking cache capacity must be at least 10"
        );
        assert!(
            self.rankings_ttl_seconds >= 1,
            "Ranking cache TTL must be at least one second"
        );
        assert!(
            self.rankings_ttl_seconds <= 3_600,
            "Ranking cache TTL cannot exceed one hour"
        );
        Ok(())
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_offset_is_utc() {
        let ledger = LedgerConfig {
            timezone_offset_minutes: 0,
        };
        assert_eq!(ledger.reference_offset().local_minus_utc(), 0);
    }

    #[test]
    fn negative_offset_resolves_west_of_utc() {
        let ledger = LedgerConfig {
            timezone_offset_minutes: -300,
        };
        assert_eq!(ledger.reference_offset().local_minus_utc(), -300 * 60);
    }
}
