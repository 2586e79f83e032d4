// # vmdns-sync - vCenter to etcd presence sync
//
// This binary is a THIN integration layer:
// - DO NOT add record logic here; it lives in vmdns-core
// - Configuration is via environment variables ONLY
//
// One invocation performs one reconciliation and exits:
// 1. Read configuration from environment variables
// 2. Initialize tracing (stderr)
// 3. Build a single-threaded runtime
// 4. Run the reconciler against vCenter and etcd (the reconciler validates
//    the configuration before any I/O)
//
// ## Configuration
//
// ### vCenter
// - `vCSAHostname`: vCenter URL, e.g. `https://vcsa.corp.local`
// - `vCSAUserName`: User name
// - `vCSAPassword`: Password
// - `vCSAInsecure`: Skip TLS verification (default: false)
//
// ### etcd
// - `etcdEndpoint`: Store address, e.g. `http://etcd.corp.local:2379`
// - `etcdPluginRootPath`: Key prefix, e.g. `/skydns/`
// - `etcdDomainName`: Domain segment of every key
// - `etcdDialTimeoutSecs`: Dial timeout in seconds (default: 5)
//
// ### Behaviour
// - `VMDNS_FAILURE_POLICY`: `abort` (default) or `continue`
// - `VMDNS_MODE`: `dry-run` logs writes instead of performing them
// - `VMDNS_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export vCSAHostname=https://vcsa.corp.local
// export vCSAUserName=administrator@vsphere.local
// export vCSAPassword=your_password
// export etcdEndpoint=http://etcd.corp.local:2379
// export etcdPluginRootPath=/skydns/
// export etcdDomainName=corp.local
//
// vmdns-sync
// ```

use anyhow::Result;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;
use vmdns_core::{Reconciler, RunSummary, SyncConfig};
use vmdns_inventory_vsphere::VsphereSource;
use vmdns_store_etcd::EtcdStore;

/// Process exit status
///
/// Any failure is reported the same way; the log says what went wrong.
#[derive(Debug, Clone, Copy)]
enum SyncExitCode {
    /// Both passes completed
    Success = 0,
    /// Configuration, inventory or store failure
    Failure = 1,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match SyncConfig::from_lookup(|name| std::env::var(name).ok()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SyncExitCode::Failure.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&config.log_level))
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::Failure.into();
    }

    info!("Starting vmdns-sync {}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::Failure.into();
        }
    };

    rt.block_on(async {
        match run_sync(config).await {
            Ok(summary) => {
                info!(
                    "Sync complete for {}: VMs {} put / {} deleted, hosts {} put / {} deleted",
                    summary.datacenter,
                    summary.vms.puts,
                    summary.vms.deletes,
                    summary.hosts.puts,
                    summary.hosts.deletes
                );
                SyncExitCode::Success
            }
            Err(e) => {
                error!("Sync failed: {:#}", e);
                SyncExitCode::Failure
            }
        }
    })
    .into()
}

/// Wire the vSphere source and etcd store into a reconciler and run it
async fn run_sync(config: SyncConfig) -> Result<RunSummary> {
    let source = VsphereSource::new(&config.inventory)?;
    let store = EtcdStore::new(&config.store)?;

    info!(
        "Syncing {} into {} under {}{}",
        source.sdk_url(),
        store.base_url(),
        config.store.root_path,
        config.store.domain_name
    );

    let reconciler = Reconciler::new(Box::new(source), Box::new(store), config)?;
    Ok(reconciler.run().await?)
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
