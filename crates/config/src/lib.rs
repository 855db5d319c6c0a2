//! authgate-config - 配置加载库

use std::collections::HashMap;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::Secret;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => 50,
        _ => 10,
    }
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
    #[serde(default)]
    pub key_prefix: Option<String>,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 客户端（应用）配置
///
/// 所有时长以秒为单位，`0` 表示该维度不限制
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: u64,
    #[serde(default = "default_session_idle_timeout")]
    pub session_idle_timeout: u64,
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: u64,
    #[serde(default)]
    pub refresh_token_disabled: bool,
    #[serde(default)]
    pub disabled: bool,
}

fn default_access_token_lifetime() -> u64 {
    1800
}

fn default_session_idle_timeout() -> u64 {
    300
}

fn default_refresh_token_lifetime() -> u64 {
    86400
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: default_access_token_lifetime(),
            session_idle_timeout: default_session_idle_timeout(),
            refresh_token_lifetime: default_refresh_token_lifetime(),
            refresh_token_disabled: false,
            disabled: false,
        }
    }
}

impl ClientConfig {
    /// 不限制任何时长的配置
    pub fn unlimited() -> Self {
        Self {
            access_token_lifetime: 0,
            session_idle_timeout: 0,
            refresh_token_lifetime: 0,
            refresh_token_disabled: false,
            disabled: false,
        }
    }

    pub fn access_token_lifetime(&self) -> Option<Duration> {
        non_zero_secs(self.access_token_lifetime)
    }

    pub fn session_idle_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.session_idle_timeout)
    }

    /// 刷新令牌被禁用时返回 None
    pub fn refresh_token_lifetime(&self) -> Option<Duration> {
        if self.refresh_token_disabled {
            return None;
        }
        non_zero_secs(self.refresh_token_lifetime)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// 会话传输配置
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub cookie_domain: Option<String>,
    #[serde(default = "default_cookie_secure")]
    pub cookie_secure: bool,
    #[serde(default = "default_access_token_header")]
    pub access_token_header: String,
    #[serde(default = "default_client_id_header")]
    pub client_id_header: String,
    #[serde(default = "default_extra_info_header")]
    pub extra_info_header: String,
    #[serde(default = "default_extra_info_max_bytes")]
    pub extra_info_max_bytes: usize,
    #[serde(default = "default_extra_info_max_keys")]
    pub extra_info_max_keys: usize,
}

fn default_cookie_name() -> String {
    "authgate_session".to_string()
}

fn default_cookie_secure() -> bool {
    true
}

fn default_access_token_header() -> String {
    "authorization".to_string()
}

fn default_client_id_header() -> String {
    "x-authgate-client-id".to_string()
}

fn default_extra_info_header() -> String {
    "x-authgate-extra-info".to_string()
}

fn default_extra_info_max_bytes() -> usize {
    1024
}

fn default_extra_info_max_keys() -> usize {
    32
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            cookie_domain: None,
            cookie_secure: default_cookie_secure(),
            access_token_header: default_access_token_header(),
            client_id_header: default_client_id_header(),
            extra_info_header: default_extra_info_header(),
            extra_info_max_bytes: default_extra_info_max_bytes(),
            extra_info_max_keys: default_extra_info_max_keys(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub clients: HashMap<String, ClientConfig>,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let config: Self = Self::figment(config_dir, &env).extract()?;

        Ok(config)
    }

    fn figment(config_dir: &str, env: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("AUTHGATE_").split("__"))
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}
