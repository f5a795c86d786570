use crate::cli::StoreArgs;
use crate::config::RapportConfig;
use rapport_ledger::{FriendshipLedger, JsonlStore, LedgerError, UserId};
use serde_json::Value;
use std::path::PathBuf;

pub fn load_config_or_exit(path: &str) -> RapportConfig {
    RapportConfig::load(path).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

/// Resolve the ledger file: `--store` wins over the config file.
pub fn open_store_or_exit(args: &StoreArgs) -> (JsonlStore, RapportConfig) {
    let config = load_config_or_exit(&args.config);
    let path = args
        .store
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| config.store.path.clone());
    let store = JsonlStore::new(path).with_lock_wait(config.store.lock_wait());
    (store, config)
}

pub fn open_ledger_or_exit(args: &StoreArgs) -> FriendshipLedger<JsonlStore> {
    let (store, _) = open_store_or_exit(args);
    FriendshipLedger::new(store)
}

pub fn acting_user_or_exit(raw: &str) -> UserId {
    UserId::parse(raw).unwrap_or_else(|| {
        eprintln!("error: --as requires a non-empty user id");
        std::process::exit(1);
    })
}

pub fn exit_on_ledger_error(err: LedgerError) -> ! {
    eprintln!("error: {err}");
    std::process::exit(1);
}

pub fn print_json(payload: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(payload).expect("json serialization")
    );
}
