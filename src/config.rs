// Конфигурация приложения
// Логирование по умолчанию включено только в режиме разработки,
// файл конфигурации может переопределить это поведение

use crate::error::{Result, SignalError};
use crate::peer::types::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true; // В режиме отладки логирование включено

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false; // В продакшене логирование отключено

/// Переменная окружения с путём к TOML-файлу конфигурации
pub const CONFIG_ENV: &str = "MANUAL_RTC_CONFIG";

pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub ice_servers: Vec<ServerConfig>,
    pub media: MediaConfig,
    pub logging: bool,
}

/// Какие устройства захвата считаются доступными
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct MediaConfig {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            media: MediaConfig::default(),
            logging: LOGGING_ENABLED,
        }
    }
}

pub fn default_ice_servers() -> Vec<ServerConfig> {
    vec![ServerConfig {
        id: "default-stun".into(),
        r#type: "stun".into(),
        url: DEFAULT_STUN_URL.into(),
        username: None,
        credential: None,
    }]
}

impl AppConfig {
    /// Читает конфиг из `MANUAL_RTC_CONFIG`, иначе дефолты
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SignalError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(raw).map_err(|e| SignalError::Config(e.to_string()))?;
        validate_servers(&config.ice_servers)?;
        Ok(config)
    }
}

/// Проверка списка ICE серверов перед установкой
pub fn validate_servers(servers: &[ServerConfig]) -> Result<()> {
    for server in servers {
        if server.url.trim().is_empty() {
            return Err(SignalError::InvalidConfig(format!(
                "server {} has an empty URL",
                server.id
            )));
        }

        if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none())
        {
            return Err(SignalError::InvalidConfig(format!(
                "TURN server {} requires username and credential",
                server.id
            )));
        }
    }
    Ok(())
}
