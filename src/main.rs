//! btcmint - BTC to crowdsale token exchange
//!
//! Run modes:
//!   btcmint-api serve [--port <port>]   - Resume pending exchanges, then serve the API
//!   btcmint-api resume                  - Resume pending exchanges and wait for them
//!   btcmint-api derive <index>          - Print the deposit address for an index

use btcmint::api::{self, AppState};
use btcmint::bitcoin::AddressDeriver;
use btcmint::common::ServiceError;
use btcmint::config::{ConfigError, ExchangeConfig, Network};
use btcmint::ethereum::{ContractWhitelist, CrowdsaleGateway, EthereumRpc, RpcClient, Whitelist};
use btcmint::exchange::ExchangeOrchestrator;
use btcmint::logging::{init_from_config, log_system_event};
use btcmint::monitoring::MonitoringService;
use btcmint::providers::{BlockcypherProvider, EsploraProvider, HttpRateProvider};
use btcmint::storage::SqliteTransactionStore;
use btcmint::types::TransactionStatus;
use futures_util::future::join_all;
use std::env;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let result = match args[1].as_str() {
        "serve" => run_server(&args[2..]).await,
        "resume" => run_resume().await,
        "derive" => run_derive(&args[2..]),
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("btcmint - BTC to crowdsale token exchange");
    println!();
    println!("Usage:");
    println!("  btcmint-api serve [--port <port>]   Resume pending exchanges and start the API (default: 4000)");
    println!("  btcmint-api resume                  Resume pending exchanges and wait for completion");
    println!("  btcmint-api derive <index>          Print the deposit address for a derivation index");
    println!();
    println!("Environment Variables:");
    println!("  BTCMINT_NETWORK             main | test (default: test)");
    println!("  BTCMINT_BITCOIN_XPUB        Master extended public key");
    println!("  BTCMINT_ETH_RPC_URL         Ethereum node (or BTCMINT_INFURA_TOKEN)");
    println!("  BTCMINT_CROWDSALE_ADDRESS   Crowdsale contract address");
    println!("  BTCMINT_OWNER_PRIVATE_KEY   Hex key of the contract owner");
    println!("  BTCMINT_DB_PATH             SQLite database (default: data/exchange.db)");
    println!("  BTCMINT_WHITELIST_ENABLED   Require isWhitelisted before issuing addresses");
}

struct Services {
    orchestrator: Arc<ExchangeOrchestrator>,
    whitelist: Option<Arc<dyn Whitelist>>,
}

async fn build_services(config: &ExchangeConfig) -> Result<Services, ServiceError> {
    let btc_network = config.network.bitcoin_network();

    let store = Arc::new(SqliteTransactionStore::new(&config.db_path)?);

    let deriver = AddressDeriver::from_encoded(&config.bitcoin_xpub, btc_network)?;

    let primary = BlockcypherProvider::new(btc_network, config.blockcypher_token.clone());
    let secondary = EsploraProvider::new(&config.esplora_url);
    let monitor = MonitoringService::new(Arc::new(primary), Arc::new(secondary))
        .with_poll_interval(config.poll_interval)
        .with_timeout(config.monitor_timeout);

    let rates = Arc::new(HttpRateProvider::new(&config.rate_url));

    let rpc: Arc<dyn EthereumRpc> = Arc::new(RpcClient::new(&config.eth_rpc_url));
    let signer = Arc::new(config.signer()?);
    info!(owner = %signer.address(), chain_id = signer.chain_id(), "Owner key loaded");

    let gateway = CrowdsaleGateway::new(rpc.clone(), config.crowdsale_address, signer);

    let whitelist = if config.whitelist_enabled {
        Some(Arc::new(ContractWhitelist::new(rpc, config.crowdsale_address)) as Arc<dyn Whitelist>)
    } else {
        None
    };

    let orchestrator =
        ExchangeOrchestrator::new(store, deriver, monitor, rates, Arc::new(gateway)).await?;

    Ok(Services {
        orchestrator: Arc::new(orchestrator),
        whitelist,
    })
}

async fn run_server(args: &[String]) -> Result<(), ServiceError> {
    let config = ExchangeConfig::from_env()?;
    init_from_config(&config)?;
    config.log_summary();

    let mut port = config.api_port;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                port = args[i + 1].parse().map_err(|_| {
                    ConfigError::InvalidValue("--port".to_string(), args[i + 1].clone())
                })?;
                i += 2;
            }
            _ => i += 1,
        }
    }

    let services = build_services(&config).await?;

    let resumed = services.orchestrator.resume_monitoring().await?;
    log_system_event(
        "service_started",
        serde_json::json!({ "port": port, "resumed": resumed.len() }),
    );

    let state = AppState::new(services.orchestrator, services.whitelist);
    api::start_server(state, port).await?;

    Ok(())
}

async fn run_resume() -> Result<(), ServiceError> {
    let config = ExchangeConfig::from_env()?;
    init_from_config(&config)?;
    config.log_summary();

    let services = build_services(&config).await?;
    let handles = services.orchestrator.resume_monitoring().await?;
    let total = handles.len();

    let mut succeeded = 0;
    let mut failed = 0;
    for outcome in join_all(handles).await {
        match outcome {
            Ok(tx) if tx.status == TransactionStatus::Success => succeeded += 1,
            Ok(_) => failed += 1,
            Err(e) => {
                error!(error = %e, "Exchange task panicked");
                failed += 1;
            }
        }
    }

    log_system_event(
        "resume_finished",
        serde_json::json!({ "total": total, "succeeded": succeeded, "failed": failed }),
    );
    println!("Resumed {} exchanges: {} succeeded, {} failed", total, succeeded, failed);

    Ok(())
}

fn run_derive(args: &[String]) -> Result<(), ServiceError> {
    let index: u32 = args
        .first()
        .ok_or_else(|| ConfigError::MissingEnvVar("<index>".to_string()))?
        .parse()
        .map_err(|_| ConfigError::InvalidValue("<index>".to_string(), args[0].clone()))?;

    let network: Network = env::var("BTCMINT_NETWORK")
        .unwrap_or_else(|_| "test".to_string())
        .parse()?;
    let xpub = env::var("BTCMINT_BITCOIN_XPUB")
        .map_err(|_| ConfigError::MissingEnvVar("BTCMINT_BITCOIN_XPUB".to_string()))?;

    let deriver = AddressDeriver::from_encoded(&xpub, network.bitcoin_network())?;
    println!("{}", deriver.derive(index)?);

    Ok(())
}
