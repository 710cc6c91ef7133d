use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Application configuration structure that defines all runtime parameters.
///
/// The configuration is assembled in three layers, each one overriding the
/// previous: the TOML file, the `REPORT_*` environment variables used by the
/// deployed system, and finally the command line.
///
/// # Examples
///
/// ```
/// use vigil::configuration::config::Config;
///
/// let config = Config::from_toml_str("[server]\nport = 8080\n").unwrap();
/// assert_eq!(config.server.port, 8080);
/// assert_eq!(config.episodes.no_face_cooldown_sec, 30.0);
/// ```
///
/// # Fields Overview
///
/// - `server`: bind address and port of the HTTP/WebSocket listener
/// - `storage`: which event/report store backs the service
/// - `episodes`: per-category cooldown windows of the episode collapser
/// - `weights`: flat deduction per category with at least one episode
/// - `caps`: upper bound on each category's deduction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub episodes: EpisodeConfig,
    pub weights: ScoringWeights,
    pub caps: ScoringCaps,
}

/// Command line of the `vigil` binary.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "vigil")]
#[command(version)]
#[command(about = "Live proctoring session broker and integrity scoring service")]
pub struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Port of the HTTP/WebSocket listener
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind the listener to
    #[arg(long)]
    pub bind_address: Option<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    /// Builds the effective configuration for the given command line, reading
    /// overrides from the process environment.
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => {
                info!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Applies the `REPORT_*` overrides. Cooldowns take any finite,
    /// non-negative number of seconds; weights and caps take non-negative
    /// integers. Anything else is ignored with a warning and the current
    /// value is kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let e = &mut self.episodes;
        override_secs(&lookup, "REPORT_FOCUS_COOLDOWN", &mut e.focus_cooldown_sec);
        override_secs(&lookup, "REPORT_MULTIFACE_COOLDOWN", &mut e.multi_face_cooldown_sec);
        override_secs(&lookup, "REPORT_NOFACE_COOLDOWN", &mut e.no_face_cooldown_sec);
        override_secs(&lookup, "REPORT_OBJECT_COOLDOWN", &mut e.object_cooldown_sec);
        override_secs(&lookup, "REPORT_EYESCLOSED_COOLDOWN", &mut e.eyes_closed_cooldown_sec);
        override_secs(&lookup, "REPORT_DROWSY_COOLDOWN", &mut e.drowsy_cooldown_sec);
        override_secs(&lookup, "REPORT_AUDIO_COOLDOWN", &mut e.audio_cooldown_sec);

        let w = &mut self.weights;
        override_num(&lookup, "REPORT_WT_FOCUS", &mut w.focus_loss);
        override_num(&lookup, "REPORT_WT_NOFACE", &mut w.no_face);
        override_num(&lookup, "REPORT_WT_MULTIFACE", &mut w.multiple_faces);
        override_num(&lookup, "REPORT_WT_PHONE", &mut w.phone);
        override_num(&lookup, "REPORT_WT_NOTES", &mut w.notes);
        override_num(&lookup, "REPORT_WT_EYESCLOSED", &mut w.eyes_closed);
        override_num(&lookup, "REPORT_WT_DROWSY", &mut w.drowsiness);
        override_num(&lookup, "REPORT_WT_AUDIO", &mut w.background_voices);

        let c = &mut self.caps;
        override_num(&lookup, "REPORT_CAP_FOCUS", &mut c.focus_loss);
        override_num(&lookup, "REPORT_CAP_NOFACE", &mut c.no_face);
        override_num(&lookup, "REPORT_CAP_MULTIFACE", &mut c.multiple_faces);
        override_num(&lookup, "REPORT_CAP_PHONE", &mut c.phone);
        override_num(&lookup, "REPORT_CAP_NOTES", &mut c.notes);
        override_num(&lookup, "REPORT_CAP_EYESCLOSED", &mut c.eyes_closed);
        override_num(&lookup, "REPORT_CAP_DROWSY", &mut c.drowsiness);
        override_num(&lookup, "REPORT_CAP_AUDIO", &mut c.background_voices);
    }

    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(addr) = &args.bind_address {
            self.server.bind_address = addr.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }
        for (key, secs) in self.episodes.entries() {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::InvalidCooldown(format!("{} = {}", key, secs)));
            }
        }
        if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
            return Err(ConfigError::MissingStoragePath);
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = IpAddr::from_str(&self.server.bind_address)
            .map_err(|e| ConfigError::BadAddress(format!("{}: {}", self.server.bind_address, e)))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }
}

fn override_num<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => {
            debug!("{} overrides {} with {}", key, slot, value);
            *slot = value;
        }
        Err(_) => warn!("Ignoring {}={:?}, not a non-negative integer", key, raw),
    }
}

fn override_secs<F>(lookup: &F, key: &str, slot: &mut f64)
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => {
            debug!("{} overrides {} with {}", key, slot, value);
            *slot = value;
        }
        _ => warn!("Ignoring {}={:?}, not a finite number of seconds", key, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_file_yields_documented_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.episodes.object_cooldown_sec, 10.0);
        assert_eq!(config.weights.phone, 15);
        assert_eq!(config.caps.drowsiness, 35);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_toml_str(
            r#"
            [episodes]
            focus_cooldown_sec = 5

            [weights]
            phone = 25

            [storage]
            backend = "file"
            path = "/tmp/vigil"
            "#,
        )
        .unwrap();

        assert_eq!(config.episodes.focus_cooldown_sec, 5.0);
        assert_eq!(config.episodes.no_face_cooldown_sec, 30.0);
        assert_eq!(config.weights.phone, 25);
        assert_eq!(config.weights.notes, 10);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/vigil")));
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = Config::from_toml_str("[server\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::TomlError(_)));
    }

    #[test]
    fn env_overrides_replace_numeric_values_only() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("REPORT_NOFACE_COOLDOWN", "45"),
            ("REPORT_WT_PHONE", " 20 "),
            ("REPORT_CAP_AUDIO", "not-a-number"),
            ("REPORT_WT_FOCUS", "-3"),
        ]));

        assert_eq!(config.episodes.no_face_cooldown_sec, 45.0);
        assert_eq!(config.weights.phone, 20);
        assert_eq!(config.caps.background_voices, 30);
        assert_eq!(config.weights.focus_loss, 5);
    }

    #[test]
    fn fractional_cooldowns_are_accepted_but_not_fractional_weights() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("REPORT_NOFACE_COOLDOWN", "1.5"),
            ("REPORT_OBJECT_COOLDOWN", "-2"),
            ("REPORT_AUDIO_COOLDOWN", "NaN"),
            ("REPORT_WT_PHONE", "2.5"),
        ]));

        assert_eq!(config.episodes.no_face_cooldown_sec, 1.5);
        assert_eq!(
            config.episodes.cooldown(crate::scoring::types::Category::NoFace),
            chrono::Duration::milliseconds(1500)
        );
        assert_eq!(config.episodes.object_cooldown_sec, 10.0);
        assert_eq!(config.episodes.audio_cooldown_sec, 20.0);
        assert_eq!(config.weights.phone, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_finite_cooldown_from_file() {
        let config = Config::from_toml_str("[episodes]\ndrowsy_cooldown_sec = inf\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCooldown(_))
        ));
    }

    #[test]
    #[serial]
    fn load_reads_file_then_environment_then_args() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 4000\n[caps]\nphone = 70").unwrap();

        std::env::set_var("REPORT_CAP_PHONE", "80");
        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            port: Some(5000),
            bind_address: Some(String::from("127.0.0.1")),
        };
        let config = Config::load(&args);
        std::env::remove_var("REPORT_CAP_PHONE");

        let config = config.unwrap();
        assert_eq!(config.caps.phone, 80);
        assert_eq!(config.server.port, 5000);
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:5000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn validate_rejects_file_backend_without_path() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::File;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingStoragePath)
        ));
    }

    #[test]
    fn validate_rejects_bad_bind_address() {
        let mut config = Config::default();
        config.server.bind_address = String::from("not-an-ip");
        assert!(matches!(config.validate(), Err(ConfigError::BadAddress(_))));
    }

    #[test]
    #[serial]
    fn cli_parses_flags() {
        let args = CliArgs::try_parse_from([
            "vigil",
            "--config",
            "/etc/vigil.toml",
            "--port",
            "9000",
            "--bind-address",
            "127.0.0.1",
        ])
        .unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(args.config, Some(PathBuf::from("/etc/vigil.toml")));
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.bind_address.as_deref(), Some("127.0.0.1"));
    }
}
