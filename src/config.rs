use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::scoring::nps::Thresholds;

/// Connection details for the remote sentiment provider. When unset the
/// daemon runs fully offline on the local keyword heuristic.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub db_path: PathBuf,
    pub thresholds: Thresholds,
    pub provider: Option<ProviderSettings>,
}

impl Settings {
    /// Read settings from the environment, applying defaults and the
    /// threshold-ordering invariant.
    pub fn from_env() -> Self {
        let port = env_parse("PULSECHECK_PORT", 3000);

        let db_path = std::env::var("PULSECHECK_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
                PathBuf::from(home).join(".pulsecheck").join("pulsecheck.db")
            });

        let thresholds = Thresholds {
            detractor: env_parse("NPS_DETRACTOR_THRESHOLD", 6),
            promoter: env_parse("NPS_PROMOTER_THRESHOLD", 9),
            risk_alert: env_parse("RISK_ALERT_CUTOFF", 0.6),
        }
        .validated();

        let provider = match (
            std::env::var("SENTIMENT_API_ENDPOINT"),
            std::env::var("SENTIMENT_API_KEY"),
        ) {
            (Ok(endpoint), Ok(api_key)) => Some(ProviderSettings {
                endpoint,
                api_key,
                model: std::env::var("SENTIMENT_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            }),
            _ => {
                info!("No sentiment provider configured, using local keyword heuristic.");
                None
            }
        };

        Self {
            port,
            db_path,
            thresholds,
            provider,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_on_missing_or_garbage() {
        std::env::remove_var("PULSECHECK_TEST_MISSING");
        assert_eq!(env_parse("PULSECHECK_TEST_MISSING", 42u16), 42);

        std::env::set_var("PULSECHECK_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_parse("PULSECHECK_TEST_GARBAGE", 42u16), 42);
        std::env::remove_var("PULSECHECK_TEST_GARBAGE");

        std::env::set_var("PULSECHECK_TEST_VALID", "7");
        assert_eq!(env_parse("PULSECHECK_TEST_VALID", 42u16), 7);
        std::env::remove_var("PULSECHECK_TEST_VALID");
    }
}
