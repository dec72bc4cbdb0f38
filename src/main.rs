use anyhow::Context;
use clap::Parser;
use hyperpic::config::Config;
use hyperpic::metrics::Metrics;
use hyperpic::proxy::HyperpicProxy;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Hyperpic - on-demand image transformation proxy built on Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "hyperpic")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn main() {
    let args = Args::parse();

    match build_server(&args) {
        Ok(Some((server, _maintenance))) => server.run_forever(),
        Ok(None) => {}
        Err(e) => {
            eprintln!("hyperpic: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Load configuration and assemble the Pingora server
///
/// Returns `None` when only a configuration test was requested. The
/// returned runtime hosts cache maintenance and must outlive the server.
fn build_server(args: &Args) -> anyhow::Result<Option<(Server, Runtime)>> {
    let config = Config::from_file(&args.config)
        .map_err(|e| anyhow::anyhow!(e))
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    hyperpic::logging::init_subscriber(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        source_provider = ?config.image.source.provider,
        cache_provider = ?config.image.cache.provider,
        "Configuration loaded successfully"
    );

    if args.test {
        tracing::info!("Configuration test passed");
        return Ok(None);
    }

    let opt = Opt {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
        ..Default::default()
    };

    let mut server = Server::new(Some(opt)).context("failed to create Pingora server")?;
    if let Some(conf) = Arc::get_mut(&mut server.configuration) {
        conf.threads = config.server.threads;
    }
    server.bootstrap();

    // Cache eviction sweeps live on their own runtime, outside Pingora's
    // per-service runtimes.
    let maintenance = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("hyperpic-maintenance")
        .enable_all()
        .build()
        .context("failed to build maintenance runtime")?;
    let guard = maintenance.enter();

    let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);
    let proxy = HyperpicProxy::from_config(&config, metrics);
    drop(guard);

    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);
    let listen_addr = config.server.listen_addr();
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(address = %listen_addr, "Starting hyperpic");

    server.add_service(proxy_service);
    Ok(Some((server, maintenance)))
}
