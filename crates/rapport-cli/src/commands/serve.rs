use crate::cli::StoreArgs;
use crate::config::RapportConfig;
use crate::support::open_store_or_exit;
use rapport_http::{HttpServerConfig, serve_ledger};
use rapport_ledger::FriendshipLedger;
use std::net::SocketAddr;

pub fn run(bind: Option<String>, args: StoreArgs) {
    let (store, config) = open_store_or_exit(&args);
    let bind = resolve_bind(bind, &config).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    println!(
        "rapport serve\n  Listening: http://{bind}\n  Store: {}",
        store.path().display()
    );

    let ledger = FriendshipLedger::new(store);
    serve_ledger(&HttpServerConfig::new(bind), &ledger).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
}

/// `--bind` wins over `[server] bind`.
fn resolve_bind(flag: Option<String>, config: &RapportConfig) -> Result<SocketAddr, String> {
    let raw = flag.unwrap_or_else(|| config.server.bind.clone());
    raw.parse()
        .map_err(|e| format!("invalid bind address `{raw}`: {e}"))
}
