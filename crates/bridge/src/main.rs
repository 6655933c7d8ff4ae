use bridge_config::{
    BridgeConfig,
    SecureComms,
    SearchProtocol,
    StoreConfig,
};
use content_workers::ContentWorkPool;
use errors::MainError;
use http_client::{
    AuthMode,
    TlsMaterial,
    Transport,
};
use index_manager::IndexManager;
use namespace_mapper::NamespaceMapper;
use pipeline::PipelineController;
use repo_client::RepoClient;
use search_client::SearchClient;

const REPOSITORY_SECRET_HEADER: &str = "X-Alfresco-Search-Secret";

fn main() -> Result<(), MainError> {
    tracing::info!("starting the indexing bridge");
    cmd_util::env::config_service();
    let config = BridgeConfig::load()?;
    tracing::info!(repository_url = %config.repository_base_url(), search_url = %config.search_base_url(), "resolved configuration");

    let runtime = tokio::runtime::Runtime::new().map_err(anyhow::Error::from)?;
    runtime.block_on(run(config))?;
    Ok(())
}

async fn run(config: BridgeConfig) -> anyhow::Result<()> {
    let repo_transport = build_repo_transport(&config)?;
    let search_transport = build_search_transport(&config)?;

    let repo = RepoClient::new(repo_transport.clone(), &config.args.repository_solr_path);
    let search = SearchClient::new(search_transport.clone(), &config.args.search_index_name);
    let index_manager = IndexManager::new(
        search_transport.clone(),
        &config.args.search_index_name,
        &config.args.search_index_control_name,
    );

    if config.args.search_index_create {
        index_manager.ensure_data_index(&serde_json::json!({})).await?;
    }
    if config.args.search_index_control_create {
        index_manager.ensure_control_index().await?;
    }

    let namespace_mapper = NamespaceMapper::new(RepoClient::new(repo_transport.clone(), &config.args.repository_solr_path));
    let content_pool = ContentWorkPool::new(
        config.args.indexer_content_threads,
        config.args.indexer_content_threads * 4,
        RepoClient::new(repo_transport, &config.args.repository_solr_path),
        SearchClient::new(search_transport, &config.args.search_index_name),
    );

    let controller = PipelineController::new(
        &config.args.indexer_cron,
        config.args.indexer_transaction_max_results,
        repo,
        search,
        index_manager,
        namespace_mapper,
        content_pool,
    )?;

    tracing::info!("entering the scheduling loop");
    controller.run_forever().await;
    Ok(())
}

fn build_repo_transport(config: &BridgeConfig) -> anyhow::Result<Transport> {
    // `RepoClient` itself prefixes every call with `repository_solr_path`, so
    // the transport's base URL must stop at the bare repository URL.
    let base_url = config.args.repository_url.clone();
    match config.args.repository_secure_comms {
        SecureComms::Secret => {
            let secret = config
                .args
                .repository_secret
                .clone()
                .ok_or_else(|| anyhow::anyhow!("repository.secureComms=secret requires repository.secret"))?;
            Transport::new(
                base_url,
                AuthMode::Secret {
                    header: REPOSITORY_SECRET_HEADER.to_string(),
                    secret,
                },
            )
        },
        SecureComms::Https => {
            let tls = load_tls_material(&config.tls.repository_keystore, &config.tls.repository_truststore)?;
            Transport::with_tls_material(base_url, AuthMode::MutualTls, tls)
        },
    }
}

fn build_search_transport(config: &BridgeConfig) -> anyhow::Result<Transport> {
    let base_url = config.search_base_url();
    match config.args.search_protocol {
        SearchProtocol::Http => Transport::new(base_url, AuthMode::MutualTls),
        SearchProtocol::Https => {
            let tls = load_tls_material(&config.tls.search_keystore, &config.tls.search_truststore)?;
            Transport::with_tls_material(base_url, AuthMode::MutualTls, tls)
        },
    }
}

fn load_tls_material(keystore: &StoreConfig, truststore: &StoreConfig) -> anyhow::Result<TlsMaterial> {
    let keystore_path = keystore
        .path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("mutual-TLS mode requires a keystore path"))?;
    let identity_pkcs12 = std::fs::read(keystore_path)
        .map_err(|e| anyhow::anyhow!("reading keystore {keystore_path:?}: {e}"))?;
    let identity_password = keystore.password.clone().unwrap_or_default();
    let root_cert_pem = match &truststore.path {
        Some(path) => Some(std::fs::read(path).map_err(|e| anyhow::anyhow!("reading truststore {path:?}: {e}"))?),
        None => None,
    };
    Ok(TlsMaterial {
        identity_pkcs12,
        identity_password,
        root_cert_pem,
    })
}
