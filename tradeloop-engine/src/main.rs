//! Standalone entry point running the engine against a config file/CLI
//! overrides, for manual exercising and smoke-testing outside a host
//! application
#![deny(missing_docs)]

use clap::Parser;
use tl_common::{TenantId, WalletId};
use tl_config::CliArgs;
use tradeloop_engine::{NftListing, TradeLoopEngine};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = CliArgs::parse();
    let config = match args.resolve() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to resolve configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(?config, "starting trade loop discovery engine");
    let engine = TradeLoopEngine::new(config);

    let tenant = TenantId::from("demo");
    seed_demo_cycle(&engine, &tenant).await;

    match engine.discover(&tenant).await {
        Ok((loops, metadata)) => {
            tracing::info!(
                loops_found = metadata.loops_found,
                sccs_processed = metadata.sccs_processed,
                "discovery run complete"
            );
            for loop_ in &loops {
                tracing::info!(canonical_id = %loop_.canonical_id, score = loop_.quality_score, "loop found");
            }
        }
        Err(err) => tracing::error!(error = %err, "discovery failed"),
    }

    engine.shutdown();
}

/// Seed a minimal three-party cycle so a fresh run has something to find
async fn seed_demo_cycle(engine: &TradeLoopEngine, tenant: &TenantId) {
    let wallets = [("A", "a1"), ("B", "b1"), ("C", "c1")];
    for (wallet, item) in wallets {
        let _ = engine.add_nft(tenant, &WalletId::from(wallet), NftListing::new(item)).await;
    }
    let wants = [("A", "b1"), ("B", "c1"), ("C", "a1")];
    for (wallet, item) in wants {
        let _ = engine.add_want(tenant, &WalletId::from(wallet), &item.into()).await;
    }
}
