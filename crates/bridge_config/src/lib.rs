//! Configuration surface for the indexing bridge (§6 of the design).
//!
//! Scalar settings are CLI flags that double as environment variables (the
//! same `clap::Parser` + `env = "..."` shape the teacher's
//! `local_backend::config::LocalConfig` uses). Keystore/truststore material
//! is binary and optional, so it lives in a small TOML file pointed to by
//! `--tls-config`, loaded once at startup rather than hot-reloaded — this
//! bridge only needs the file at process start, unlike the teacher's
//! signal-driven `ConfigLoader`.

use std::path::PathBuf;

use clap::{
    Parser,
    ValueEnum,
};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SecureComms {
    Secret,
    Https,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchProtocol {
    Http,
    Https,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "indexing-bridge", about = "Incremental repository-to-search indexing bridge")]
pub struct CliArgs {
    /// Cron expression controlling how often a pipeline cycle is triggered.
    #[arg(long, env = "INDEXER_CRON", default_value = "*/5 * * * *")]
    pub indexer_cron: String,

    /// Upper bound on the number of transactions fetched in one cycle.
    #[arg(long, env = "INDEXER_TRANSACTION_MAX_RESULTS", default_value_t = 2000)]
    pub indexer_transaction_max_results: u32,

    /// Size of the content worker pool.
    #[arg(long, env = "INDEXER_CONTENT_THREADS", default_value_t = 4)]
    pub indexer_content_threads: usize,

    #[arg(long, env = "REPOSITORY_URL")]
    pub repository_url: String,

    #[arg(long, env = "REPOSITORY_SOLR_PATH", default_value = "solr")]
    pub repository_solr_path: String,

    #[arg(long, env = "REPOSITORY_SECURE_COMMS", value_enum, default_value_t = SecureComms::Secret)]
    pub repository_secure_comms: SecureComms,

    /// Required when `repository_secure_comms = secret`.
    #[arg(long, env = "REPOSITORY_SECRET")]
    pub repository_secret: Option<String>,

    #[arg(long, env = "SEARCH_HOST", default_value = "localhost")]
    pub search_host: String,

    #[arg(long, env = "SEARCH_PORT", default_value_t = 9200)]
    pub search_port: u16,

    #[arg(long, env = "SEARCH_PROTOCOL", value_enum, default_value_t = SearchProtocol::Http)]
    pub search_protocol: SearchProtocol,

    #[arg(long, env = "SEARCH_INDEX_NAME", default_value = "alfresco")]
    pub search_index_name: String,

    #[arg(long, env = "SEARCH_INDEX_CREATE", default_value_t = true)]
    pub search_index_create: bool,

    #[arg(long, env = "SEARCH_INDEX_CONTROL_NAME", default_value = "alfresco-control")]
    pub search_index_control_name: String,

    #[arg(long, env = "SEARCH_INDEX_CONTROL_CREATE", default_value_t = true)]
    pub search_index_control_create: bool,

    /// Path to a TOML file carrying keystore/truststore material, required
    /// only when `repository_secure_comms = https` or when the search
    /// client itself needs a client certificate.
    #[arg(long, env = "BRIDGE_TLS_CONFIG")]
    pub tls_config_path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
    #[serde(rename = "type")]
    pub store_type: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TlsConfig {
    #[serde(default)]
    pub repository_keystore: StoreConfig,
    #[serde(default)]
    pub repository_truststore: StoreConfig,
    #[serde(default)]
    pub search_keystore: StoreConfig,
    #[serde(default)]
    pub search_truststore: StoreConfig,
}

/// Fully resolved configuration: CLI/env scalars plus the optional TLS file.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub args: CliArgs,
    pub tls: TlsConfig,
}

impl BridgeConfig {
    /// Parses CLI/env flags and loads the TLS file, if one was given.
    /// Returns an error on malformed TOML or a missing secret in secret
    /// mode; per §6, this is a startup-time failure and terminates the
    /// process with a non-zero exit code.
    pub fn load() -> anyhow::Result<Self> {
        let args = CliArgs::parse();
        Self::from_args(args)
    }

    pub fn from_args(args: CliArgs) -> anyhow::Result<Self> {
        if matches!(args.repository_secure_comms, SecureComms::Secret) && args.repository_secret.is_none() {
            anyhow::bail!("repository.secureComms=secret requires repository.secret to be set");
        }
        let tls = match &args.tls_config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("reading TLS config {path:?}: {e}"))?;
                toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing TLS config {path:?}: {e}"))?
            },
            None => TlsConfig::default(),
        };
        Ok(Self { args, tls })
    }

    pub fn repository_base_url(&self) -> String {
        format!(
            "{}/{}",
            self.args.repository_url.trim_end_matches('/'),
            self.args.repository_solr_path.trim_matches('/'),
        )
    }

    pub fn search_base_url(&self) -> String {
        let scheme = match self.args.search_protocol {
            SearchProtocol::Http => "http",
            SearchProtocol::Https => "https",
        };
        format!("{scheme}://{}:{}", self.args.search_host, self.args.search_port)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    fn base_args() -> CliArgs {
        CliArgs::parse_from([
            "indexing-bridge",
            "--repository-url",
            "http://repo.internal:8080",
            "--repository-secret",
            "s3cr3t",
        ])
    }

    #[test]
    fn secret_mode_without_secret_is_rejected() {
        let mut args = base_args();
        args.repository_secret = None;
        let err = BridgeConfig::from_args(args).unwrap_err();
        assert!(err.to_string().contains("repository.secret"));
    }

    #[test]
    fn resolves_base_urls() {
        let config = BridgeConfig::from_args(base_args()).unwrap();
        assert_eq!(config.repository_base_url(), "http://repo.internal:8080/solr");
        assert_eq!(config.search_base_url(), "http://localhost:9200");
    }

    #[test]
    fn loads_tls_material_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [repository_keystore]
            path = "/etc/bridge/keystore.p12"
            type = "PKCS12"
            password = "changeit"
            "#
        )
        .unwrap();
        let mut args = base_args();
        args.tls_config_path = Some(file.path().to_path_buf());
        let config = BridgeConfig::from_args(args).unwrap();
        assert_eq!(
            config.tls.repository_keystore.store_type.as_deref(),
            Some("PKCS12")
        );
    }
}
