use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use cosmic_claims::{
    asset::{
        Address,
        AssetClass,
        Operation,
    },
    config::{
        ClientConfig,
        ConfigStore,
        DEFAULT_CONFIG_FILE,
    },
    contract::PlannedCall,
    indexer_client::IndexerClient,
    odds::raffle_odds,
    read_api::ReadApi,
    reconcile::PeriodicRefresh,
};
use futures::future::try_join_all;
use itertools::Itertools;
use std::{
    path::PathBuf,
    sync::Arc,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
    prelude::*,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON config file; missing files fall back to defaults.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[arg(long)]
    api_url: Option<String>,

    #[arg(short, long)]
    owner: Option<Address>,

    /// Round to report odds for; the current round when omitted.
    #[arg(short, long)]
    round: Option<u64>,

    /// Keep polling the index until interrupted.
    #[arg(short, long, default_value = "false")]
    watch: bool,

    #[arg(long)]
    settle_delay_ms: Option<u64>,

    /// Also write daily-rotated logs to this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Write the effective config back to --config and exit.
    #[arg(long, default_value = "false")]
    init_config: bool,
}

fn init_tracing(log_dir: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cosmic_claims=info"));
    let stderr = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter).with(stderr);
    match log_dir {
        Some(dir) => {
            let appender = rolling::daily(dir, "cosmic-claims.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_ansi(false).with_writer(writer);
            registry
                .with(file)
                .try_init()
                .wrap_err("installing the tracing subscriber")?;
            Ok(Some(guard))
        }
        None => {
            registry
                .try_init()
                .wrap_err("installing the tracing subscriber")?;
            Ok(None)
        }
    }
}

fn apply_overrides(mut config: ClientConfig, args: &Args) -> ClientConfig {
    if let Some(url) = &args.api_url {
        config.api_url = url.clone();
    }
    if let Some(owner) = args.owner {
        config.owner = Some(owner);
    }
    if let Some(delay) = args.settle_delay_ms {
        config.settle_delay_ms = delay;
    }
    config
}

async fn report<R: ReadApi>(
    api: &R,
    owner: Option<Address>,
    round: Option<u64>,
) -> Result<(), cosmic_claims::ClaimError> {
    let summary = api.round_summary(round).await?;
    println!(
        "round {}: {} bids, {} ETH / {} NFT raffle winners",
        summary.round,
        summary.total_bids,
        summary.eth_raffle_winners,
        summary.nft_raffle_winners
    );
    let Some(owner) = owner else {
        return Ok(());
    };
    let bids = api.user_bids(&owner, summary.round).await?;
    for odds in raffle_odds(&summary, bids) {
        println!(
            "  {}: {bids} of your bids, {:.2}% chance to win",
            odds.category,
            odds.probability * 100.0
        );
    }
    let desks: Vec<_> = AssetClass::ALL
        .into_iter()
        .cartesian_product([Operation::Claim, Operation::Stake, Operation::Unstake])
        .filter(|&(class, operation)| PlannedCall::supports(class, operation))
        .collect();
    let listings = try_join_all(
        desks
            .iter()
            .map(|&(class, operation)| api.listing(&owner, class, operation.listing())),
    )
    .await?;
    for ((class, operation), items) in desks.into_iter().zip(listings) {
        let available = items
            .iter()
            .filter(|item| item.settled == operation.listing().expects_settled())
            .count();
        println!("  {class}: {available} available to {operation}");
    }
    Ok(())
}

async fn handle_interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received interrupt, exiting"),
        Err(e) => tracing::warn!(error = %e, "interrupt handler failed, exiting anyway"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _guard = init_tracing(args.log_dir.as_ref())?;

    let store = ConfigStore::new(&args.config);
    let config = store
        .load()
        .map_err(|e| eyre!("{e:#}"))
        .wrap_err("loading config")?;
    let config = apply_overrides(config, &args);
    config.validate().map_err(|e| eyre!("{e:#}"))?;

    if args.init_config {
        store.save(&config).map_err(|e| eyre!("{e:#}"))?;
        println!("wrote {}", store.path().display());
        return Ok(());
    }

    let api = Arc::new(
        IndexerClient::new(config.api_url.clone())?.with_raffle_defaults(config.raffle),
    );
    tracing::info!(api_url = api.base_url(), "starting cosmic-claims");
    report(api.as_ref(), config.owner, args.round).await?;

    if args.watch {
        let owner = config.owner;
        let round = args.round;
        let poller = {
            let api = api.clone();
            PeriodicRefresh::spawn(config.poll_interval(), move || {
                let api = api.clone();
                async move { report(api.as_ref(), owner, round).await }
            })
        };
        handle_interrupt().await;
        poller.stop().await;
    }
    Ok(())
}
