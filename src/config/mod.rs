//! Configuration module - environment variable parsing

mod tuning;

pub use tuning::{CombatTuning, FalloffMode, GameplayTuning, MovementTuning, VitalsTuning};

use std::env;
use std::net::SocketAddr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed CORS origins, comma-separated; `*` allows any
    pub client_origin: String,
    /// Maximum players per match
    pub max_players: usize,
    /// Fixed seed for spawn selection (random when absent)
    pub match_seed: Option<u64>,
    /// Gameplay tuning shared by every match
    pub tuning: GameplayTuning,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render-style PORT wins, then SERVER_ADDR, then the default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let mut tuning = GameplayTuning::default();

        if let Some(ms) = parse_var::<u64>("FIRE_RATE_LEEWAY_MS")? {
            tuning.combat.fire_rate_leeway = ms as f64 / 1000.0;
        }
        if let Some(secs) = parse_var::<f64>("RESPAWN_DELAY_SECS")? {
            if secs < 0.0 {
                return Err(ConfigError::Invalid("RESPAWN_DELAY_SECS"));
            }
            tuning.vitals.respawn_delay = secs;
        }
        if let Ok(mode) = env::var("FALLOFF_MODE") {
            tuning.combat.falloff_mode = match mode.trim().to_ascii_lowercase().as_str() {
                "extrapolate" => FalloffMode::Extrapolate,
                "clamp" => FalloffMode::Clamp,
                _ => return Err(ConfigError::Invalid("FALLOFF_MODE")),
            };
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            max_players: parse_var::<usize>("MAX_PLAYERS")?.unwrap_or(16),
            match_seed: parse_var::<u64>("MATCH_SEED")?,
            tuning,
        })
    }
}

/// Parse an optional environment variable, rejecting malformed values
fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tuning_matches_gameplay_constants() {
        let tuning = GameplayTuning::default();
        assert_eq!(tuning.combat.fire_rate_leeway, 0.025);
        assert_eq!(tuning.combat.falloff_mode, FalloffMode::Extrapolate);
        assert_eq!(tuning.vitals.respawn_delay, 7.0);
        assert_eq!(tuning.movement.aim_grace, 0.25);
        assert_eq!(tuning.movement.hip_fire_grace, 0.1);
    }
}
