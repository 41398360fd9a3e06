use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tables: TableConfig,
    pub identity: IdentityConfig,
    pub devices: DeviceConfig,
    pub telemetry: TelemetryConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

/// Collection names for the five logical stores plus the identity and
/// device registry state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub office: String,
    pub manager: String,
    pub user: String,
    pub room_config: String,
    pub sensor_log: String,
    pub identity: String,
    pub device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub token_secret: String,
    pub access_token_ttl_secs: i64,
    pub code_ttl_secs: i64,
    pub min_password_length: usize,
    pub max_code_attempts: u32,
    /// Lifetime of a `NEW_PASSWORD_REQUIRED` challenge session
    pub session_ttl_secs: i64,
    /// Undelivered secrets kept for the development outbox
    pub outbox_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub policy_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub default_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("SMART_OFFICE_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_BACKEND") {
            self.storage.backend = match v.to_ascii_lowercase().as_str() {
                "postgres" | "pg" => StorageBackend::Postgres,
                "memory" => StorageBackend::Memory,
                _ => self.storage.backend,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.storage.database_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.storage.max_connections = v.parse().unwrap_or(self.storage.max_connections);
        }

        // Table overrides (names match the deployed collections)
        if let Ok(v) = env::var("OFFICE_TABLE") {
            self.tables.office = v;
        }
        if let Ok(v) = env::var("MANAGER_TABLE") {
            self.tables.manager = v;
        }
        if let Ok(v) = env::var("USER_TABLE") {
            self.tables.user = v;
        }
        if let Ok(v) = env::var("ROOM_CONFIG_TABLE") {
            self.tables.room_config = v;
        }
        if let Ok(v) = env::var("SENSOR_LOG_TABLE") {
            self.tables.sensor_log = v;
        }
        if let Ok(v) = env::var("IDENTITY_TABLE") {
            self.tables.identity = v;
        }
        if let Ok(v) = env::var("DEVICE_TABLE") {
            self.tables.device = v;
        }

        // Identity overrides
        if let Ok(v) = env::var("IDENTITY_TOKEN_SECRET") {
            self.identity.token_secret = v;
        }
        if let Ok(v) = env::var("IDENTITY_ACCESS_TOKEN_TTL_SECS") {
            self.identity.access_token_ttl_secs = v.parse().unwrap_or(self.identity.access_token_ttl_secs);
        }
        if let Ok(v) = env::var("IDENTITY_CODE_TTL_SECS") {
            self.identity.code_ttl_secs = v.parse().unwrap_or(self.identity.code_ttl_secs);
        }
        if let Ok(v) = env::var("IDENTITY_MIN_PASSWORD_LENGTH") {
            self.identity.min_password_length = v.parse().unwrap_or(self.identity.min_password_length);
        }
        if let Ok(v) = env::var("IDENTITY_MAX_CODE_ATTEMPTS") {
            self.identity.max_code_attempts = v.parse().unwrap_or(self.identity.max_code_attempts);
        }
        if let Ok(v) = env::var("IDENTITY_SESSION_TTL_SECS") {
            self.identity.session_ttl_secs = v.parse().unwrap_or(self.identity.session_ttl_secs);
        }
        if let Ok(v) = env::var("IDENTITY_OUTBOX_CAPACITY") {
            self.identity.outbox_capacity = v.parse().unwrap_or(self.identity.outbox_capacity);
        }

        // Device overrides
        if let Ok(v) = env::var("DEVICE_POLICY_NAME") {
            self.devices.policy_name = v;
        }

        // Telemetry overrides
        if let Ok(v) = env::var("TELEMETRY_DEFAULT_LIMIT") {
            self.telemetry.default_limit = v.parse().unwrap_or(self.telemetry.default_limit);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    fn tables() -> TableConfig {
        TableConfig {
            office: "Office".to_string(),
            manager: "Manager".to_string(),
            user: "User".to_string(),
            room_config: "RoomConfig".to_string(),
            sensor_log: "SensorLog".to_string(),
            identity: "Identity".to_string(),
            device: "DeviceRegistry".to_string(),
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                database_url: None,
                max_connections: 5,
            },
            tables: Self::tables(),
            identity: IdentityConfig {
                token_secret: "development-secret-change-me".to_string(),
                access_token_ttl_secs: 60 * 60,
                code_ttl_secs: 24 * 60 * 60,
                min_password_length: 8,
                max_code_attempts: 5,
                session_ttl_secs: 3 * 60,
                outbox_capacity: 256,
            },
            devices: DeviceConfig {
                policy_name: "SmartOffice-DevicePolicy".to_string(),
            },
            telemetry: TelemetryConfig { default_limit: 50 },
            security: SecurityConfig {
                cors_origins: vec!["*".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                database_url: None,
                max_connections: 10,
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        let mut config = Self {
            environment: Environment::Production,
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                database_url: None,
                max_connections: 20,
            },
            ..Self::development()
        };
        // Production must supply its own signing secret
        config.identity.token_secret = String::new();
        config.identity.access_token_ttl_secs = 15 * 60;
        config.identity.outbox_capacity = 32;
        config
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
