//! extip controller - allocates external IPs to cluster nodes

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, CustomResourceExt};
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use extip::crd::{IpClaim, IpNode};
use extip::retry::{retry_with_backoff, RetryConfig};
use extip::scheduler::IpClaimScheduler;
use extip::store::{claim_events, service_events, ClaimClient, NodeClient};

/// extip - Kubernetes controller for external IP allocation
#[derive(Parser, Debug)]
#[command(name = "extip", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Netmask bit width applied to every derived claim CIDR
    #[arg(
        long,
        env = "EXTIP_DEFAULT_MASK",
        default_value = extip::DEFAULT_MASK,
        value_parser = clap::value_parser!(u8).range(0..=32)
    )]
    mask: u8,

    /// Seconds between node monitor sweeps
    #[arg(
        long,
        env = "EXTIP_MONITOR_INTERVAL",
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    monitor_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        // Generate CRD YAML for both resources
        let claim_crd = serde_yaml::to_string(&IpClaim::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize IpClaim CRD: {}", e))?;
        let node_crd = serde_yaml::to_string(&IpNode::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize IpNode CRD: {}", e))?;
        println!("{claim_crd}---\n{node_crd}");
        return Ok(());
    }

    run_controller(cli).await
}

/// Ensure the extip CRDs are installed
///
/// The controller installs its own CRDs on startup using server-side
/// apply, so the CRD versions always match the controller version. The
/// API server may not be reachable immediately, hence the bounded retry.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let retry = RetryConfig::with_max_attempts(5);

    tracing::info!("Installing IpClaim CRD...");
    retry_with_backoff(&retry, "install ipclaim crd", || {
        let crds = crds.clone();
        async move {
            let params = PatchParams::apply("extip-controller").force();
            crds.patch("ipclaims.extip.dev", &params, &Patch::Apply(&IpClaim::crd()))
                .await
        }
    })
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install IpClaim CRD: {}", e))?;

    tracing::info!("Installing IpNode CRD...");
    retry_with_backoff(&retry, "install ipnode crd", || {
        let crds = crds.clone();
        async move {
            let params = PatchParams::apply("extip-controller").force();
            crds.patch("ipnodes.extip.dev", &params, &Patch::Apply(&IpNode::crd()))
                .await
        }
    })
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install IpNode CRD: {}", e))?;

    tracing::info!("All extip CRDs installed/updated");
    Ok(())
}

/// Run the three reconciliation loops until a shutdown signal
async fn run_controller(cli: Cli) -> anyhow::Result<()> {
    tracing::info!("extip controller starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    let scheduler = Arc::new(
        IpClaimScheduler::new(
            cli.mask.to_string(),
            Arc::new(ClaimClient::new(client.clone())),
            Arc::new(NodeClient::new(client.clone())),
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?,
    );

    let stop = CancellationToken::new();

    tracing::info!(
        mask = cli.mask,
        monitor_interval_secs = cli.monitor_interval_secs,
        "Starting extip loops..."
    );

    let service_task = {
        let scheduler = scheduler.clone();
        let events = Box::pin(service_events(client.clone()));
        let stop = stop.clone();
        tokio::spawn(async move { scheduler.service_watcher(events, stop).await })
    };

    let claim_task = {
        let scheduler = scheduler.clone();
        let events = Box::pin(claim_events(client.clone()));
        let stop = stop.clone();
        tokio::spawn(async move { scheduler.claim_watcher(events, stop).await })
    };

    let monitor_task = {
        let scheduler = scheduler.clone();
        let interval = tokio::time::interval(Duration::from_secs(cli.monitor_interval_secs));
        let ticks = IntervalStream::new(interval).map(|_| ());
        let stop = stop.clone();
        tokio::spawn(async move { scheduler.monitor_ip_nodes(ticks, stop).await })
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }

    tracing::info!("Shutdown signal received, stopping loops");
    stop.cancel();

    let _ = tokio::join!(service_task, claim_task, monitor_task);

    tracing::info!("extip controller shutting down");
    Ok(())
}
