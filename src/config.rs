use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub db: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory with the SVG viewer's static files
    pub static_dir: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: Backend,
    /// Connect to a database on this machine instead of `host`/`port`
    pub local: bool,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub max_connections: u32,
    pub connection_string: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig::default(),
            db: DatabaseConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            static_dir: "public".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Postgres,
            local: true,
            host: "localhost".to_string(),
            port: 5432,
            database: "roomedit".to_string(),
            username: None,
            password: None,
            max_connections: 10,
            connection_string: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional config file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Add environment variables with prefix "ROOM_EDITOR", e.g. ROOM_EDITOR__DB__HOST
        config = config.add_source(
            config::Environment::with_prefix("ROOM_EDITOR")
                .separator("__")
                .prefix_separator("__"),
        );

        // Hosting platforms hand out the listen port as plain PORT
        config = config.set_override_option("server.port", std::env::var("PORT").ok())?;

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl DatabaseConfig {
    /// Build the PostgreSQL connection options.
    ///
    /// `connection_string` wins when set; otherwise the options are assembled
    /// field by field so credentials never pass through URL escaping.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(connection_string) = &self.connection_string {
            return PgConnectOptions::from_str(connection_string);
        }

        if self.local {
            return Ok(PgConnectOptions::new()
                .host("localhost")
                .database(&self.database));
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database);
        if let Some(username) = &self.username {
            options = options.username(username);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }

    /// Where the database lives, without credentials, for log lines
    pub fn display_location(&self) -> String {
        if self.connection_string.is_some() {
            return "configured connection string".to_string();
        }
        if self.local {
            format!("localhost/{}", self.database)
        } else {
            format!("{}:{}/{}", self.host, self.port, self.database)
        }
    }

    pub fn is_local(&self) -> bool {
        self.local || self.host == "localhost" || self.host == "127.0.0.1"
    }
}
