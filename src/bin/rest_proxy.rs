use anyhow::Context;
use clap::Parser;
use rustmq_rest::access::AccessControlGate;
use rustmq_rest::api::{ApiState, RestApi};
use rustmq_rest::broker::{InMemoryBroker, TopicSpec};
use rustmq_rest::config::Config;
use rustmq_rest::types::{BrokerId, BrokerInfo};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rustmq-rest-proxy")]
#[command(about = "RustMQ REST Proxy - produce records and manage ACLs over HTTP")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address, overrides server.listen
    #[arg(long)]
    listen: Option<String>,

    /// Comma-separated endpoint allowlist, overrides access.allowlist
    #[arg(long)]
    allowlist: Option<String>,

    /// Comma-separated endpoint blocklist, overrides access.blocklist
    #[arg(long)]
    blocklist: Option<String>,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path))?,
        None => Config::default(),
    };

    if let Some(listen) = &cli.listen {
        config.server.listen = listen.clone();
    }
    if let Some(allowlist) = &cli.allowlist {
        config.access.allowlist = allowlist.clone();
    }
    if let Some(blocklist) = &cli.blocklist {
        config.access.blocklist = blocklist.clone();
    }

    config.validate()?;
    Ok(config)
}

fn embedded_broker(config: &Config) -> InMemoryBroker {
    let cluster = &config.cluster;
    let broker =
        InMemoryBroker::new(cluster.cluster_id.clone()).with_max_record_bytes(cluster.max_record_bytes);

    for entry in &cluster.brokers {
        broker.add_broker(BrokerInfo {
            id: entry.id,
            host: entry.host.clone(),
            port: entry.port,
            rack: entry.rack.clone(),
        });
    }

    let broker_ids: Vec<BrokerId> = cluster.brokers.iter().map(|b| b.id).collect();
    for topic in &cluster.topics {
        broker.add_topic(
            TopicSpec::spread(
                topic.name.clone(),
                topic.partitions,
                topic.replication_factor,
                &broker_ids,
            )
            .with_timestamp_type(topic.timestamp_type),
        );
    }

    broker
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rules = config.access.rule_set()?;
    if !rules.has_allowlist() && rules.block_rules().is_empty() {
        warn!("No endpoint allowlist or blocklist configured, every endpoint is reachable");
    }
    let gate = AccessControlGate::new(rules);

    let broker = Arc::new(embedded_broker(&config));
    info!(
        "Serving cluster {} with {} topics",
        config.cluster.cluster_id,
        config.cluster.topics.len()
    );

    let state = ApiState::with_broker(gate, broker, config.producer.request_timeout())?
        .with_max_body_bytes(config.max_body_bytes());
    let api = RestApi::new(state, config.server.listen_addr()?);

    api.start(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutting down REST proxy");
    })
    .await?;

    Ok(())
}
