//! Extension pour intégrer l'afficheur dans pmoconfig
//!
//! Ce module fournit le trait `DisplayConfigExt` qui ajoute à
//! `pmoconfig::Config` les réglages de l'afficheur : URL du catalogue,
//! intervalles de polling et du watchdog, politique de remplissage de la
//! playlist, taille du journal d'infos et programme de lecture.
//!
//! # Exemple
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmodisplay::DisplayConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! let settings = config.get_display_settings()?;
//! println!("Polling {} every {:?}", settings.catalog_url, settings.poll_interval);
//! # Ok(())
//! # }
//! ```

use crate::command_player::CommandPlayerConfig;
use crate::info::DEFAULT_INFO_CAPACITY;
use crate::runtime::DisplaySettings;
use crate::scheduler::{RefillPolicy, DEFAULT_REFILL_SIZE, DEFAULT_REFILL_SKEW};
use crate::source::{DEFAULT_CATALOG_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::Value;
use std::time::Duration;

/// Default poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default watchdog interval in milliseconds
pub const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 1000;

const CATALOG_URL: &[&str] = &["display", "catalog", "url"];
const POLL_INTERVAL_MS: &[&str] = &["display", "catalog", "poll_interval_ms"];
const REQUEST_TIMEOUT_SECS: &[&str] = &["display", "catalog", "request_timeout_secs"];
const WATCHDOG_INTERVAL_MS: &[&str] = &["display", "watchdog", "interval_ms"];
const REFILL_SIZE: &[&str] = &["display", "playlist", "refill_size"];
const REFILL_SKEW: &[&str] = &["display", "playlist", "skew"];
const INFO_CAPACITY: &[&str] = &["display", "info", "capacity"];
const PLAYER_PROGRAM: &[&str] = &["display", "player", "program"];
const PLAYER_ARGS: &[&str] = &["display", "player", "args"];
const PLAYER_FULLSCREEN_ARGS: &[&str] = &["display", "player", "fullscreen_args"];

/// Trait d'extension pour gérer la configuration de l'afficheur dans pmoconfig
///
/// # Auto-persist des valeurs par défaut
///
/// Les getters persistent automatiquement les valeurs par défaut dans la
/// configuration si elles n'existent pas encore ou sont invalides.
pub trait DisplayConfigExt {
    /// URL du document JSON du catalogue
    fn get_catalog_url(&self) -> Result<String>;

    fn set_catalog_url(&self, url: &str) -> Result<()>;

    /// Intervalle entre deux requêtes au catalogue (défaut: 1 s)
    fn get_poll_interval(&self) -> Result<Duration>;

    fn set_poll_interval(&self, interval: Duration) -> Result<()>;

    /// Timeout d'une requête au catalogue (défaut: 10 s)
    fn get_request_timeout(&self) -> Result<Duration>;

    fn set_request_timeout(&self, timeout: Duration) -> Result<()>;

    /// Intervalle du watchdog de lecture (défaut: 1 s)
    fn get_watchdog_interval(&self) -> Result<Duration>;

    fn set_watchdog_interval(&self, interval: Duration) -> Result<()>;

    /// Taille et biais du tirage de remplissage (défaut: 5 / 0.8)
    fn get_refill_policy(&self) -> Result<RefillPolicy>;

    fn set_refill_policy(&self, policy: RefillPolicy) -> Result<()>;

    /// Nombre de lignes d'infos conservées (défaut: 50)
    fn get_info_capacity(&self) -> Result<usize>;

    fn set_info_capacity(&self, capacity: usize) -> Result<()>;

    /// Programme de lecture et ses arguments (défaut: mpv)
    fn get_player_config(&self) -> Result<CommandPlayerConfig>;

    fn set_player_config(&self, player: &CommandPlayerConfig) -> Result<()>;

    /// Assemble tous les réglages de l'afficheur
    fn get_display_settings(&self) -> Result<DisplaySettings>;
}

/// Reads a strictly positive integer, persisting `default` otherwise
fn positive_u64(config: &Config, path: &[&str], default: u64) -> Result<u64> {
    match config.get_u64(path) {
        Some(value) if value > 0 => Ok(value),
        _ => {
            config.set_u64(path, default)?;
            Ok(default)
        }
    }
}

impl DisplayConfigExt for Config {
    fn get_catalog_url(&self) -> Result<String> {
        match self.get_string(CATALOG_URL) {
            Some(url) => Ok(url),
            None => {
                self.set_catalog_url(DEFAULT_CATALOG_URL)?;
                Ok(DEFAULT_CATALOG_URL.to_string())
            }
        }
    }

    fn set_catalog_url(&self, url: &str) -> Result<()> {
        self.set_value(CATALOG_URL, Value::String(url.to_string()))
    }

    fn get_poll_interval(&self) -> Result<Duration> {
        positive_u64(self, POLL_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS).map(Duration::from_millis)
    }

    fn set_poll_interval(&self, interval: Duration) -> Result<()> {
        self.set_u64(POLL_INTERVAL_MS, interval.as_millis() as u64)
    }

    fn get_request_timeout(&self) -> Result<Duration> {
        positive_u64(self, REQUEST_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS)
            .map(Duration::from_secs)
    }

    fn set_request_timeout(&self, timeout: Duration) -> Result<()> {
        self.set_u64(REQUEST_TIMEOUT_SECS, timeout.as_secs())
    }

    fn get_watchdog_interval(&self) -> Result<Duration> {
        positive_u64(self, WATCHDOG_INTERVAL_MS, DEFAULT_WATCHDOG_INTERVAL_MS)
            .map(Duration::from_millis)
    }

    fn set_watchdog_interval(&self, interval: Duration) -> Result<()> {
        self.set_u64(WATCHDOG_INTERVAL_MS, interval.as_millis() as u64)
    }

    fn get_refill_policy(&self) -> Result<RefillPolicy> {
        let batch_size = positive_u64(self, REFILL_SIZE, DEFAULT_REFILL_SIZE as u64)? as usize;
        let skew = match self.get_f64(REFILL_SKEW) {
            Some(skew) if skew.is_finite() && skew > 0.0 => skew,
            _ => {
                self.set_f64(REFILL_SKEW, DEFAULT_REFILL_SKEW)?;
                DEFAULT_REFILL_SKEW
            }
        };
        Ok(RefillPolicy { batch_size, skew })
    }

    fn set_refill_policy(&self, policy: RefillPolicy) -> Result<()> {
        self.set_u64(REFILL_SIZE, policy.batch_size as u64)?;
        self.set_f64(REFILL_SKEW, policy.skew)
    }

    fn get_info_capacity(&self) -> Result<usize> {
        positive_u64(self, INFO_CAPACITY, DEFAULT_INFO_CAPACITY as u64).map(|n| n as usize)
    }

    fn set_info_capacity(&self, capacity: usize) -> Result<()> {
        self.set_u64(INFO_CAPACITY, capacity as u64)
    }

    fn get_player_config(&self) -> Result<CommandPlayerConfig> {
        let defaults = CommandPlayerConfig::default();

        let program = match self.get_string(PLAYER_PROGRAM) {
            Some(program) => program,
            None => {
                self.set_value(PLAYER_PROGRAM, Value::String(defaults.program.clone()))?;
                defaults.program
            }
        };
        let args = match self.get_string_list(PLAYER_ARGS) {
            Some(args) => args,
            None => {
                self.set_string_list(PLAYER_ARGS, &defaults.args)?;
                defaults.args
            }
        };
        let fullscreen_args = match self.get_string_list(PLAYER_FULLSCREEN_ARGS) {
            Some(args) => args,
            None => {
                self.set_string_list(PLAYER_FULLSCREEN_ARGS, &defaults.fullscreen_args)?;
                defaults.fullscreen_args
            }
        };

        Ok(CommandPlayerConfig {
            program,
            args,
            fullscreen_args,
        })
    }

    fn set_player_config(&self, player: &CommandPlayerConfig) -> Result<()> {
        self.set_value(PLAYER_PROGRAM, Value::String(player.program.clone()))?;
        self.set_string_list(PLAYER_ARGS, &player.args)?;
        self.set_string_list(PLAYER_FULLSCREEN_ARGS, &player.fullscreen_args)
    }

    fn get_display_settings(&self) -> Result<DisplaySettings> {
        Ok(DisplaySettings {
            catalog_url: self.get_catalog_url()?,
            poll_interval: self.get_poll_interval()?,
            request_timeout: self.get_request_timeout()?,
            watchdog_interval: self.get_watchdog_interval()?,
            refill: self.get_refill_policy()?,
            info_capacity: self.get_info_capacity()?,
            player: self.get_player_config()?,
        })
    }
}
