use dotenvy::dotenv;
use log::{error, info};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use reward_ledger::blockchain::FileStore;
use reward_ledger::{Address, Ledger, LedgerConfig};

fn main() -> ExitCode {
    let _ = dotenv();
    env_logger::init();

    let config = LedgerConfig::from_env();
    let data_dir = env::var("LEDGER_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    info!("⛓️ Opening ledger '{}' in {data_dir}", config.snapshot_key);

    let mut ledger = Ledger::builder(config)
        .store(Arc::new(FileStore::new(&data_dir)))
        .build();

    // Optionally seal whatever the last session left pending.
    if let Ok(miner) = env::var("LEDGER_MINER") {
        let miner = Address::new(miner);
        if !ledger.pending().is_empty() {
            match ledger.mine_pending_transactions(&miner) {
                Ok(block) => info!("sealed pending pool into block {}", block.hash),
                Err(e) => {
                    error!("mining failed: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        if let Err(e) = ledger.try_persist() {
            error!("could not write snapshot: {e}");
            return ExitCode::FAILURE;
        }
        info!("{miner} balance: {}", ledger.balance_of(&miner));
    }

    let stats = ledger.chain_stats();
    match serde_json::to_string_pretty(&stats) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!("could not render chain stats: {e}");
            return ExitCode::FAILURE;
        }
    }

    if stats.is_valid {
        ExitCode::SUCCESS
    } else {
        error!("chain failed validation");
        ExitCode::FAILURE
    }
}
