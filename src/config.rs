use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub engine: EngineConfig,
    pub db: DbConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub request_timeout_secs: u64,
    pub public_dir: PathBuf,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Where plan directories (and their report/log trees) live.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    pub root_dir: PathBuf,
}

/// Location of the external load-test tool installation.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub home: PathBuf,
    pub properties_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig { pub url: String }

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("LOADMETER__").split("__"));
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_TOML: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 6006
        enable_cors = false
        request_timeout_secs = 30
        public_dir = "public"

        [workspace]
        root_dir = "loadmeter"

        [engine]
        home = "apache-jmeter-5.6.2"
        properties_file = "jmeter.properties"

        [db]
        url = "sqlite://loadmeter.db?mode=rwc"
    "#;

    #[test]
    fn extracts_from_toml_provider() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file("config/default.toml", DEFAULT_TOML)?;
            let cfg = Config::load().expect("config should parse");
            assert_eq!(cfg.server.port, 6006);
            assert_eq!(cfg.workspace.root_dir, PathBuf::from("loadmeter"));
            assert_eq!(cfg.engine.properties_file, "jmeter.properties");
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file("config/default.toml", DEFAULT_TOML)?;
            jail.set_env("LOADMETER__SERVER__PORT", "7001");
            let cfg = Config::load().expect("config should parse");
            assert_eq!(cfg.server.port, 7001);
            Ok(())
        });
    }

    #[test]
    fn socket_addr_parses() {
        let server = ServerConfig {
            host: "0.0.0.0".into(),
            port: 6006,
            enable_cors: true,
            request_timeout_secs: 30,
            public_dir: "public".into(),
        };
        assert_eq!(server.socket_addr().unwrap().port(), 6006);
    }
}
