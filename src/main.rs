use std::net::SocketAddr;
use std::sync::Arc;

use shardcache::cluster::service::ClusterService;
use shardcache::config::NodesConfig;
use shardcache::server::CacheServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<String> = None;
    let mut node_id: Option<String> = None;
    let mut capacity: usize = 100;
    let mut virtual_nodes: u32 = 10;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                config_path = Some(args[i + 1].clone());
                i += 2;
            }
            "--node-id" => {
                node_id = Some(args[i + 1].clone());
                i += 2;
            }
            "--capacity" => {
                capacity = args[i + 1].parse()?;
                i += 2;
            }
            "--virtual" => {
                virtual_nodes = args[i + 1].parse()?;
                i += 2;
            }
            "--verbose" => {
                verbose = true;
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let Some(config_path) = config_path else {
        eprintln!(
            "Usage: {} --config <nodes.json> [--node-id <id>] [--capacity <n>] [--virtual <n>] [--verbose]",
            args[0]
        );
        std::process::exit(1);
    };

    let config = NodesConfig::load(&config_path)?;

    // Identity comes from the flag, falling back to matching this machine's
    // hostname against the configured hosts.
    let local = match node_id {
        Some(id) => config
            .node_for_id(&id)
            .ok_or_else(|| anyhow::anyhow!("node id {} not present in {}", id, config_path))?,
        None => {
            let hostname = std::env::var("HOSTNAME")
                .map_err(|_| anyhow::anyhow!("--node-id not given and HOSTNAME is unset"))?;
            config.node_for_host(&hostname).ok_or_else(|| {
                anyhow::anyhow!("host {} not present in {}", hostname, config_path)
            })?
        }
    };

    tracing::info!(node = %local.id, "starting cache node");

    let cluster = ClusterService::new(
        local.clone(),
        config.descriptors(),
        virtual_nodes,
        std::process::id(),
    );
    let server = CacheServer::new(capacity, Arc::clone(&cluster))?;

    let rest_addr = SocketAddr::new("0.0.0.0".parse()?, local.rest_port);
    let rpc_addr = SocketAddr::new("0.0.0.0".parse()?, local.rpc_port);
    let rest_listener = tokio::net::TcpListener::bind(rest_addr).await?;
    let rpc_listener = tokio::net::TcpListener::bind(rpc_addr).await?;

    tracing::info!(rest = %rest_addr, rpc = %rpc_addr, "listeners bound");

    let (rest_task, rpc_task) = server.serve(rest_listener, rpc_listener);
    let background = server.start_background();

    tracing::info!("node running, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    cluster.shutdown();

    let _ = background.await;
    let _ = rest_task.await;
    let _ = rpc_task.await;

    Ok(())
}
