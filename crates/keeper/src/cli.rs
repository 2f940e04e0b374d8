use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use serde_json::json;
use shared::web3::contracts::core::builder::ContractBuilder;
use shared::web3::wallet::Wallet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::server::start_server;
use crate::dispatcher::FinalizationDispatcher;
use crate::error::KeeperError;
use crate::evaluator::PoolEvaluator;
use crate::events::{BlockTracker, EventMonitor};
use crate::gateway::{ChainGateway, PoolReader};
use crate::locks::PoolLocks;
use crate::price::coingecko::DEFAULT_API_URL;
use crate::price::{to_fixed_point, CoinGeckoPriceSource, PriceSource};
use crate::scheduler::PoolCheckScheduler;
use crate::utils::loop_heartbeats::LoopHeartbeats;

const WEI_PER_GWEI: u128 = 1_000_000_000;

#[derive(Parser)]
#[command(author, version, about = "Finalizes prediction pools when their price conditions are met", long_about = None)]
pub struct Cli {
    /// RPC URL
    #[arg(short = 'r', long, env = "RPC_URL", default_value = "http://localhost:8545", global = true)]
    pub rpc_url: String,

    /// Private key of the account that submits transactions
    #[arg(short = 'k', long, env = "PRIVATE_KEY", hide_env_values = true, global = true)]
    pub private_key: Option<String>,

    /// Prediction market contract address
    #[arg(short = 'c', long, env = "CONTRACT_ADDRESS", global = true)]
    pub contract_address: Option<Address>,

    /// Price API base URL
    #[arg(long, default_value = DEFAULT_API_URL, global = true)]
    pub price_api_url: String,

    /// Price API asset id
    #[arg(long, default_value = "bitcoin", global = true)]
    pub asset_id: String,

    /// Quote currency
    #[arg(long, default_value = "usd", global = true)]
    pub vs_currency: String,

    /// Priority fee added on top of the network gas price, in gwei
    #[arg(long, default_value = "2", global = true)]
    pub priority_fee_gwei: u64,

    /// Log level
    #[arg(short = 'l', long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the periodic pool checker, the event monitor and the health server
    Run {
        /// Seconds between pool checks
        #[arg(long, default_value = "60")]
        check_interval: u64,

        /// Seconds between event polls
        #[arg(long, default_value = "2")]
        event_poll_interval: u64,

        /// Block marker file of the event monitor
        #[arg(long, default_value = "last_processed_block.json")]
        block_file: PathBuf,

        /// Do not follow contract events
        #[arg(long, default_value = "false")]
        disable_event_monitor: bool,

        /// Health server host
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Health server port
        #[arg(short = 'p', long, default_value = "8000")]
        port: u16,
    },

    /// Run one evaluation pass over a pool or all active pools
    Check {
        #[arg(long)]
        pool_id: Option<u64>,
    },

    /// Print the current asset price
    Price,

    #[command(subcommand)]
    Pool(PoolCommands),

    /// Finalize a pool at the given price, or the current price
    Finalize {
        pool_id: u64,

        /// Decimal price, e.g. 67012.5
        #[arg(long)]
        price: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PoolCommands {
    /// Print a pool's on-chain state
    Get { pool_id: u64 },

    /// Create a pool
    Create {
        /// Decimal target price, e.g. 3000
        #[arg(long)]
        target_price: String,

        /// Decimal stop loss, e.g. 2500
        #[arg(long)]
        stop_loss: String,

        /// Duration in seconds
        #[arg(long)]
        duration: u64,
    },
}

pub fn setup_logging(log_level: &str) {
    let level = match log_level {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .filter_module("hyper", LevelFilter::Warn)
        .filter_module("hyper_util", LevelFilter::Warn)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("alloy", LevelFilter::Warn)
        .format_timestamp(None)
        .init();
}

impl Cli {
    pub async fn run(self, cancel_token: CancellationToken) -> Result<()> {
        match &self.command {
            Commands::Run {
                check_interval,
                event_poll_interval,
                block_file,
                disable_event_monitor,
                host,
                port,
            } => {
                let gateway = self.gateway()?;
                let evaluator = self.evaluator(gateway.clone());
                let heartbeats = Arc::new(LoopHeartbeats::new(!disable_event_monitor));
                let mut tasks: JoinSet<Result<()>> = JoinSet::new();

                let scheduler = PoolCheckScheduler::new(
                    evaluator,
                    Duration::from_secs(*check_interval),
                    heartbeats.clone(),
                    cancel_token.clone(),
                );
                tasks.spawn(async move {
                    scheduler.run().await;
                    Ok(())
                });

                if !disable_event_monitor {
                    let monitor = EventMonitor::new(
                        Arc::new(gateway.market().clone()),
                        gateway.clone(),
                        BlockTracker::new(block_file.clone()),
                        Duration::from_secs(*event_poll_interval),
                        heartbeats.clone(),
                        cancel_token.clone(),
                    );
                    tasks.spawn(monitor.run());
                }

                tokio::select! {
                    res = start_server(host, *port, heartbeats) => {
                        if let Err(e) = res {
                            error!("Server error: {e}");
                        }
                    }
                    Some(res) = tasks.join_next() => {
                        if let Err(e) = res? {
                            error!("Task error: {e}");
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        info!("Shutdown signal received");
                    }
                }

                cancel_token.cancel();
                tasks.shutdown().await;
                Ok(())
            }
            Commands::Check { pool_id } => {
                let evaluator = self.evaluator(self.gateway()?);
                match evaluator
                    .evaluate_and_finalize(pool_id.map(U256::from))
                    .await
                {
                    Ok(outcome) => {
                        let mut body = serde_json::to_value(&outcome)?;
                        body["message"] = json!(outcome.message());
                        println!("{}", serde_json::to_string_pretty(&body)?);
                        Ok(())
                    }
                    Err(e) => Err(report(e)),
                }
            }
            Commands::Price => {
                let price = self.price_source().current_price().await?;
                println!(
                    "The current {} price is {} {}",
                    self.asset_id,
                    format_ether(price),
                    self.vs_currency.to_uppercase()
                );
                Ok(())
            }
            Commands::Pool(PoolCommands::Get { pool_id }) => {
                let gateway = self.gateway()?;
                match gateway.get_pool(U256::from(*pool_id)).await? {
                    Some(pool) => {
                        println!("{}", serde_json::to_string_pretty(&pool)?);
                        Ok(())
                    }
                    None => Err(report(KeeperError::PoolNotFound(U256::from(*pool_id)))),
                }
            }
            Commands::Pool(PoolCommands::Create {
                target_price,
                stop_loss,
                duration,
            }) => {
                let target_price = to_fixed_point(target_price)?;
                let stop_loss = to_fixed_point(stop_loss)?;
                if stop_loss >= target_price {
                    return Err(anyhow!("stop loss must be below the target price"));
                }

                let gateway = self.gateway()?;
                let fees = self.dispatcher(gateway.clone()).fee_bid().await?;
                let tx_hash = gateway
                    .create_pool(target_price, stop_loss, U256::from(*duration), fees)
                    .await?;
                println!("Pool created successfully with transaction hash: {tx_hash}");
                Ok(())
            }
            Commands::Finalize { pool_id, price } => {
                let price = price.as_deref().map(to_fixed_point).transpose()?;
                let evaluator = self.evaluator(self.gateway()?);
                match evaluator.finalize_pool(U256::from(*pool_id), price).await {
                    Ok(tx_hash) => {
                        println!("Pool {pool_id} finalized successfully! Transaction Hash: {tx_hash}");
                        Ok(())
                    }
                    Err(e) => Err(report(e)),
                }
            }
        }
    }

    fn gateway(&self) -> Result<Arc<ChainGateway>> {
        let private_key = self
            .private_key
            .as_deref()
            .ok_or_else(|| anyhow!("a private key is required (--private-key or PRIVATE_KEY)"))?;
        let contract_address = self.contract_address.ok_or_else(|| {
            anyhow!("a contract address is required (--contract-address or CONTRACT_ADDRESS)")
        })?;
        let rpc_url: Url = self
            .rpc_url
            .parse()
            .map_err(|e| anyhow!("invalid RPC URL {}: {e}", self.rpc_url))?;

        let wallet = Wallet::new(private_key, rpc_url)?;
        let contracts = ContractBuilder::new(wallet.provider())
            .with_prediction_market(contract_address)
            .build()?;
        info!("Submitting from account {}", wallet.address());

        Ok(Arc::new(ChainGateway::new(
            wallet,
            contracts.prediction_market,
        )))
    }

    fn price_source(&self) -> Arc<CoinGeckoPriceSource> {
        Arc::new(CoinGeckoPriceSource::new(
            &self.price_api_url,
            &self.asset_id,
            &self.vs_currency,
        ))
    }

    fn dispatcher(&self, gateway: Arc<ChainGateway>) -> FinalizationDispatcher {
        FinalizationDispatcher::new(gateway, u128::from(self.priority_fee_gwei) * WEI_PER_GWEI)
    }

    fn evaluator(&self, gateway: Arc<ChainGateway>) -> PoolEvaluator {
        PoolEvaluator::new(
            self.price_source(),
            gateway.clone(),
            self.dispatcher(gateway),
            PoolLocks::new(),
        )
    }
}

/// Prints a failed keeper result as JSON and hands it back for the exit code.
fn report(error: KeeperError) -> anyhow::Error {
    let body = json!({
        "status": "error",
        "kind": error.kind(),
        "message": error.to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    error.into()
}
