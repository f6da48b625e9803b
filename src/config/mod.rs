use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub geo: GeoConfig,
    pub frontend: FrontendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Shared secret for `/logs`. When unset every request is rejected.
    pub key: Option<String>,
}

// Keep the secret out of debug output.
impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoBackend {
    /// HTTP lookup service (ip-api.com compatible)
    Remote,
    /// Offline MaxMind City database
    Maxmind,
    /// Geolocation disabled, every visit is "Unknown"
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    pub backend: GeoBackend,
    pub api_url: String,
    pub timeout_secs: u64,
    /// Address used for lookups when the caller is on a loopback or private network
    pub placeholder_ip: IpAddr,
    pub mmdb_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Path to directory containing the index/admin pages
    /// If None, uses the embedded pages
    pub static_dir: Option<String>,
}

impl GeoConfig {
    pub const DEFAULT_API_URL: &'static str = "http://ip-api.com/json";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 3;
    pub const DEFAULT_PLACEHOLDER_IP: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(8, 8, 8, 8));
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_str = var("DATABASE_BACKEND").unwrap_or_else(|| "sqlite".to_string());
        let backend = parse_database_backend(&backend_str);

        let database_url =
            var("DATABASE_URL").unwrap_or_else(|| "sqlite://./visits.db".to_string());

        let max_connections = var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "5".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = var("PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let admin_key = var("ADMIN_KEY").filter(|k| !k.is_empty());

        let geo_backend = parse_geo_backend(&var("GEO_BACKEND").unwrap_or_else(|| "remote".into()));

        let api_url = var("GEO_API_URL")
            .unwrap_or_else(|| GeoConfig::DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let timeout_secs = match var("GEO_TIMEOUT_SECS") {
            Some(v) => v
                .parse::<u64>()
                .context("GEO_TIMEOUT_SECS must be a whole number of seconds")?,
            None => GeoConfig::DEFAULT_TIMEOUT_SECS,
        };

        let placeholder_ip = match var("GEO_PLACEHOLDER_IP") {
            Some(v) => v
                .parse::<IpAddr>()
                .with_context(|| format!("GEO_PLACEHOLDER_IP '{v}' is not an IP address"))?,
            None => GeoConfig::DEFAULT_PLACEHOLDER_IP,
        };

        let mmdb_path = var("GEOIP_DB_PATH");
        if geo_backend == GeoBackend::Maxmind && mmdb_path.is_none() {
            anyhow::bail!("GEOIP_DB_PATH must be set when GEO_BACKEND=maxmind");
        }

        let frontend_static_dir = var("FRONTEND_STATIC_DIR");

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            admin: AdminConfig { key: admin_key },
            geo: GeoConfig {
                backend: geo_backend,
                api_url,
                timeout_secs,
                placeholder_ip,
                mmdb_path,
            },
            frontend: FrontendConfig {
                static_dir: frontend_static_dir,
            },
        })
    }
}

fn parse_database_backend(value: &str) -> DatabaseBackend {
    match value.to_lowercase().as_str() {
        "postgres" | "postgresql" => DatabaseBackend::Postgres,
        "sqlite" => DatabaseBackend::Sqlite,
        other => {
            tracing::warn!(
                "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres"
            );
            DatabaseBackend::Sqlite
        }
    }
}

fn parse_geo_backend(value: &str) -> GeoBackend {
    match value.to_lowercase().as_str() {
        "remote" => GeoBackend::Remote,
        "maxmind" | "mmdb" => GeoBackend::Maxmind,
        "none" | "off" | "disabled" => GeoBackend::None,
        other => {
            tracing::warn!(
                "Unknown GEO_BACKEND '{other}', falling back to 'remote'. Supported values: remote, maxmind, none"
            );
            GeoBackend::Remote
        }
    }
}
