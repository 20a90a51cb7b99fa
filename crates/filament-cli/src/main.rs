//! # Filament CLI Entry Point
//!
//! Main binary for the filament federated pipeline supervisor. Starts a
//! connector peer and, optionally, initiates a chain from a JSON config
//! file.
//!
//! ## Usage
//!
//! ```bash
//! # Start a connector
//! filament connector --uid peer-1 -b 0.0.0.0:7411 \
//!   --peer svc-b=http://peer2:7411
//!
//! # Start a connector and initiate a chain
//! filament start -c chain.json --uid initiator -b 0.0.0.0:7411 \
//!   --peer svc-b=http://peer2:7411
//!
//! # Non-default wire paths (must match across the fabric)
//! filament connector --uid peer-1 \
//!   --setup-path /v2/setup --run-path /v2/run --notify-path /v2/notify
//! ```
//!
//! A chain config file is the JSON array of stage configs, e.g.
//!
//! ```json
//! [
//!   {"services": ["svc-a"], "location": "local"},
//!   {"services": ["svc-b"], "location": "remote"}
//! ]
//! ```
//!
//! ## URL Format
//!
//! All peer URLs must include the `http://` or `https://` prefix.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use argh::FromArgs;

use filament_common::{HttpPoster, Paths, StageConfig};
use filament_connector::ConnectorServer;
use filament_supervisor::{
    default_callbacks, AgentMonitoringResolver, MonitoringAgent, StaticHostResolver, Supervisor,
};

/// Ensures a peer URL carries an explicit http:// or https:// scheme.
///
/// Bare `host:port` strings are rejected at startup so a misconfigured peer
/// fails immediately instead of at its first POST.
fn validate_http_url(url: &str, description: &str) -> Result<()> {
    let has_scheme = ["http://", "https://"]
        .iter()
        .any(|scheme| url.starts_with(scheme));
    anyhow::ensure!(
        has_scheme,
        "invalid {}: '{}' must include an http:// or https:// prefix",
        description,
        url
    );
    Ok(())
}

/// Ensures a wire path is rooted, so appending it to a resolved host yields
/// a usable URL.
fn validate_wire_path(path: &str, description: &str) -> Result<()> {
    anyhow::ensure!(
        path.starts_with('/'),
        "invalid {}: '{}' must start with /",
        description,
        path
    );
    Ok(())
}

/// Parses a `--peer svc=url` mapping.
fn parse_peer(entry: &str) -> Result<(String, String)> {
    let (service, url) = entry.split_once('=').ok_or_else(|| {
        anyhow::anyhow!("Invalid peer mapping '{}': expected <service>=<url>", entry)
    })?;
    validate_http_url(url, "peer address")?;
    Ok((service.to_string(), url.to_string()))
}

#[derive(FromArgs)]
/// filament - federated pipeline supervisor
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Connector(ConnectorArgs),
    Start(StartArgs),
}

/// Arguments shared by both serving modes.
#[derive(FromArgs)]
#[argh(subcommand, name = "connector")]
/// start a filament connector
struct ConnectorArgs {
    /// unique id of this peer, embedded in node and chain ids
    #[argh(option, short = 'u')]
    uid: String,

    /// address to bind the connector's HTTP server to
    ///
    /// Defaults to "0.0.0.0:7411".
    #[argh(option, short = 'b', default = "\"0.0.0.0:7411\".into()")]
    bind: String,

    /// public URL other peers reach this connector at
    ///
    /// Defaults to http://<bind>. Used as the monitoring host for chains
    /// this peer initiates. Must include the http:// or https:// prefix.
    #[argh(option, long = "public-url")]
    public_url: Option<String>,

    /// service-to-peer mapping, e.g. --peer svc-b=http://peer2:7411
    ///
    /// Can be given multiple times; seeds the static host resolver.
    #[argh(option, long = "peer")]
    peers: Vec<String>,

    /// URL path setup broadcasts are exchanged on
    ///
    /// Appended to resolved peer hosts; must match across the fabric.
    /// Defaults to "/chain/setup".
    #[argh(option, long = "setup-path", default = "\"/chain/setup\".into()")]
    setup_path: String,

    /// URL path data hand-offs are exchanged on
    ///
    /// Defaults to "/chain/run".
    #[argh(option, long = "run-path", default = "\"/chain/run\".into()")]
    run_path: String,

    /// URL path status reports are exchanged on
    ///
    /// Defaults to "/chain/notify".
    #[argh(option, long = "notify-path", default = "\"/chain/notify\".into()")]
    notify_path: String,
}

/// Arguments for starting a connector and initiating a chain.
#[derive(FromArgs)]
#[argh(subcommand, name = "start")]
/// start a connector and initiate a chain from a config file
struct StartArgs {
    /// path to the chain config file (a JSON array of stage configs)
    #[argh(option, short = 'c')]
    chain: String,

    /// unique id of this peer, embedded in node and chain ids
    #[argh(option, short = 'u')]
    uid: String,

    /// address to bind the connector's HTTP server to
    #[argh(option, short = 'b', default = "\"0.0.0.0:7411\".into()")]
    bind: String,

    /// public URL other peers reach this connector at
    #[argh(option, long = "public-url")]
    public_url: Option<String>,

    /// service-to-peer mapping, e.g. --peer svc-b=http://peer2:7411
    #[argh(option, long = "peer")]
    peers: Vec<String>,

    /// URL path setup broadcasts are exchanged on
    ///
    /// Defaults to "/chain/setup".
    #[argh(option, long = "setup-path", default = "\"/chain/setup\".into()")]
    setup_path: String,

    /// URL path data hand-offs are exchanged on
    ///
    /// Defaults to "/chain/run".
    #[argh(option, long = "run-path", default = "\"/chain/run\".into()")]
    run_path: String,

    /// URL path status reports are exchanged on
    ///
    /// Defaults to "/chain/notify".
    #[argh(option, long = "notify-path", default = "\"/chain/notify\".into()")]
    notify_path: String,
}

struct PeerSetup {
    supervisor: Arc<Supervisor>,
    addr: SocketAddr,
}

/// Builds the wire paths from the three CLI flags, validating each.
fn build_paths(setup: String, run: String, notify: String) -> Result<Paths> {
    validate_wire_path(&setup, "setup path")?;
    validate_wire_path(&run, "run path")?;
    validate_wire_path(&notify, "notify path")?;
    Ok(Paths { setup, run, notify })
}

fn build_supervisor(
    uid: &str,
    bind: &str,
    public_url: Option<String>,
    peer_entries: &[String],
    paths: Paths,
) -> Result<PeerSetup> {
    let mut resolver = StaticHostResolver::new();
    for entry in peer_entries {
        let (service, url) = parse_peer(entry)?;
        tracing::info!("peer mapping: {} -> {}", service, url);
        resolver.insert(service, url);
    }

    let public_url = match public_url {
        Some(url) => {
            validate_http_url(&url, "public URL")?;
            url
        }
        None => format!("http://{}", bind),
    };

    let agent = Arc::new(MonitoringAgent::new());
    let callbacks = default_callbacks(
        Arc::new(HttpPoster::new()),
        Arc::new(resolver),
        Arc::new(AgentMonitoringResolver::new(agent.clone())),
        paths,
    );
    let supervisor =
        Arc::new(Supervisor::new(uid, callbacks, agent).with_public_url(public_url));

    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", bind, e))?;

    Ok(PeerSetup { supervisor, addr })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Default log level INFO, overridable via RUST_LOG.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Connector(args) => {
            tracing::info!("starting filament connector '{}'", args.uid);
            let paths = build_paths(args.setup_path, args.run_path, args.notify_path)?;
            let setup = build_supervisor(
                &args.uid,
                &args.bind,
                args.public_url,
                &args.peers,
                paths.clone(),
            )?;
            ConnectorServer::with_paths(setup.supervisor, paths)
                .run(setup.addr)
                .await?;
            Ok(())
        }
        Commands::Start(args) => {
            tracing::info!("starting filament connector '{}' as chain initiator", args.uid);
            let config_text = std::fs::read_to_string(&args.chain)
                .map_err(|e| anyhow::anyhow!("Failed to read chain config {}: {}", args.chain, e))?;
            let config: Vec<StageConfig> = serde_json::from_str(&config_text)
                .map_err(|e| anyhow::anyhow!("Invalid chain config {}: {}", args.chain, e))?;

            let paths = build_paths(args.setup_path, args.run_path, args.notify_path)?;
            let setup = build_supervisor(
                &args.uid,
                &args.bind,
                args.public_url,
                &args.peers,
                paths.clone(),
            )?;
            let supervisor = setup.supervisor.clone();

            let server = ConnectorServer::with_paths(setup.supervisor, paths);
            let addr = setup.addr;
            let server_handle = tokio::spawn(async move { server.run(addr).await });

            // Give the listener a moment before peers start answering setup
            // broadcasts with run requests.
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            let chain_id = supervisor.start_chain(config).await?;
            tracing::info!("chain {} started", chain_id);

            server_handle.await??;
            Ok(())
        }
    }
}

/// CLI argument parsing tests.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_connector() {
        let args: Cli = Cli::from_args(
            &["filament"],
            &["connector", "-u", "peer-1", "-b", "0.0.0.0:7411"],
        )
        .unwrap();
        match args.command {
            Commands::Connector(ConnectorArgs {
                uid,
                bind,
                public_url,
                peers,
                setup_path,
                run_path,
                notify_path,
            }) => {
                assert_eq!(uid, "peer-1");
                assert_eq!(bind, "0.0.0.0:7411");
                assert!(public_url.is_none());
                assert!(peers.is_empty());
                assert_eq!(setup_path, "/chain/setup");
                assert_eq!(run_path, "/chain/run");
                assert_eq!(notify_path, "/chain/notify");
            }
            _ => panic!("Expected Connector command"),
        }
    }

    #[test]
    fn test_cli_parse_connector_custom_paths() {
        let args: Cli = Cli::from_args(
            &["filament"],
            &[
                "connector",
                "-u",
                "peer-1",
                "--setup-path",
                "/v2/setup",
                "--run-path",
                "/v2/run",
                "--notify-path",
                "/v2/notify",
            ],
        )
        .unwrap();
        match args.command {
            Commands::Connector(ConnectorArgs {
                setup_path,
                run_path,
                notify_path,
                ..
            }) => {
                assert_eq!(setup_path, "/v2/setup");
                assert_eq!(run_path, "/v2/run");
                assert_eq!(notify_path, "/v2/notify");
            }
            _ => panic!("Expected Connector command"),
        }
    }

    #[test]
    fn test_cli_parse_start_custom_paths() {
        let args: Cli = Cli::from_args(
            &["filament"],
            &[
                "start",
                "-c",
                "chain.json",
                "-u",
                "initiator",
                "--run-path",
                "/v2/run",
            ],
        )
        .unwrap();
        match args.command {
            Commands::Start(StartArgs {
                setup_path,
                run_path,
                ..
            }) => {
                assert_eq!(setup_path, "/chain/setup");
                assert_eq!(run_path, "/v2/run");
            }
            _ => panic!("Expected Start command"),
        }
    }

    #[test]
    fn test_build_paths_validates_each_flag() {
        let paths = build_paths(
            "/v2/setup".into(),
            "/v2/run".into(),
            "/v2/notify".into(),
        )
        .unwrap();
        assert_eq!(paths.setup, "/v2/setup");
        assert_eq!(paths.run, "/v2/run");
        assert_eq!(paths.notify, "/v2/notify");

        assert!(build_paths("setup".into(), "/run".into(), "/notify".into()).is_err());
        assert!(build_paths("/setup".into(), "run".into(), "/notify".into()).is_err());
        assert!(build_paths("/setup".into(), "/run".into(), "notify".into()).is_err());
    }

    #[test]
    fn test_cli_parse_connector_defaults_bind() {
        let args: Cli = Cli::from_args(&["filament"], &["connector", "-u", "peer-1"]).unwrap();
        match args.command {
            Commands::Connector(ConnectorArgs { bind, .. }) => {
                assert_eq!(bind, "0.0.0.0:7411");
            }
            _ => panic!("Expected Connector command"),
        }
    }

    #[test]
    fn test_cli_parse_connector_multiple_peers() {
        let args: Cli = Cli::from_args(
            &["filament"],
            &[
                "connector",
                "-u",
                "peer-1",
                "--peer",
                "svc-a=http://peer2:7411",
                "--peer",
                "svc-b=http://peer3:7411",
            ],
        )
        .unwrap();
        match args.command {
            Commands::Connector(ConnectorArgs { peers, .. }) => {
                assert_eq!(peers.len(), 2);
            }
            _ => panic!("Expected Connector command"),
        }
    }

    #[test]
    fn test_cli_parse_start() {
        let args: Cli = Cli::from_args(
            &["filament"],
            &["start", "-c", "chain.json", "-u", "initiator"],
        )
        .unwrap();
        match args.command {
            Commands::Start(StartArgs { chain, uid, .. }) => {
                assert_eq!(chain, "chain.json");
                assert_eq!(uid, "initiator");
            }
            _ => panic!("Expected Start command"),
        }
    }

    #[test]
    fn test_parse_peer_mapping() {
        let (service, url) = parse_peer("svc-b=http://peer2:7411").unwrap();
        assert_eq!(service, "svc-b");
        assert_eq!(url, "http://peer2:7411");
    }

    #[test]
    fn test_parse_peer_rejects_missing_separator() {
        assert!(parse_peer("svc-b").is_err());
    }

    #[test]
    fn test_parse_peer_rejects_bare_host() {
        assert!(parse_peer("svc-b=peer2:7411").is_err());
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("http://peer2:7411", "peer").is_ok());
        assert!(validate_http_url("https://peer2", "peer").is_ok());
        assert!(validate_http_url("peer2:7411", "peer").is_err());
    }
}
