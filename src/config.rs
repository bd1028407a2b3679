use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} missing, it is required")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}': {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub flags_path: PathBuf,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv().is_ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_port = lookup("PORT").ok_or(ConfigError::Missing("PORT"))?;
        let port = raw_port.trim().parse().map_err(|_| ConfigError::Invalid {
            name: "PORT",
            value: raw_port.clone(),
            expected: "PORT must be a valid u16 number",
        })?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let flags_path = lookup("FLAGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("flags.json"));

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                    expected: "expected 'text' or 'json'",
                })
            }
        };

        Ok(Self {
            host,
            port,
            flags_path,
            log_format,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
