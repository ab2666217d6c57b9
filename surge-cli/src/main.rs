//! Surge CLI - scenario-driven API load testing
//!
//! Wires the configuration sources (YAML file under command-line flags),
//! builds the pre-authenticated connections and hands everything to the
//! orchestration runner.

mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use surge_core::connection::ConnectionConfig;
use surge_core::{ApiConnection, Runner, parse_rate};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "surge")]
#[command(about = "A scenario-driven load tester for cluster-management APIs")]
struct Cli {
    /// YAML configuration file.
    #[arg(long, default_value = "config.yaml")]
    config_file: PathBuf,

    /// Gateway URL to run the suite against.
    #[arg(long)]
    gateway_url: Option<String>,

    /// SSO endpoint used to exchange the offline token.
    #[arg(long)]
    token_url: Option<String>,

    /// Offline authorization token.
    #[arg(long)]
    token: Option<String>,

    /// OAuth client id for the token exchange.
    #[arg(long)]
    client_id: Option<String>,

    /// OAuth client secret, when the client requires one.
    #[arg(long)]
    client_secret: Option<String>,

    /// Unique id identifying this run; a fresh UUID when omitted.
    #[arg(long)]
    test_id: Option<String>,

    /// Output directory for result files.
    #[arg(long)]
    output_path: Option<PathBuf>,

    /// Duration of each scenario in minutes.
    #[arg(long)]
    duration: Option<i64>,

    /// Aggregate attack rate, e.g. 5/s (units: ns, us, ms, s, m, h).
    #[arg(long)]
    rate: Option<String>,

    /// Cooldown between scenarios in seconds.
    #[arg(long)]
    cooldown: Option<i64>,

    /// Number of pre-authenticated connections to fan each scenario out
    /// across.
    #[arg(long)]
    connections: Option<usize>,

    /// Scenario names to run; when omitted, the config file selects, and
    /// with no selection at all every scenario runs.
    #[arg(long, value_delimiter = ',')]
    test_names: Vec<String>,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut store = settings::load_store(&cli.config_file)?;
    settings::apply_flags(&mut store, &cli);
    settings::select_tests(&mut store, &cli.test_names);

    let token = store
        .string("token")
        .context("an offline token is required (--token or `token` in the config file)")?;
    let gateway_url = settings::string_or(&store, "gateway-url", settings::DEFAULT_GATEWAY_URL);
    let token_url = settings::string_or(&store, "token-url", settings::DEFAULT_TOKEN_URL);
    let client_id = settings::string_or(&store, "client-id", settings::DEFAULT_CLIENT_ID);
    let client_secret = store.string("client-secret");
    let run_id = store
        .string("test-id")
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let output_path = settings::string_or(&store, "output-path", settings::DEFAULT_OUTPUT_PATH);
    let connection_count = store
        .integer("connections")
        .map(|count| count.max(1) as usize)
        .unwrap_or(settings::DEFAULT_CONNECTIONS);

    // Fail fast on an unparseable global rate, before any token exchange.
    let rate = settings::string_or(&store, "rate", surge_core::config::DEFAULT_RATE);
    parse_rate(&rate, connection_count).with_context(|| format!("parsing rate {rate:?}"))?;

    tracing::info!("Using output directory: {}", output_path);

    let connection_config = ConnectionConfig {
        gateway_url,
        token_url,
        offline_token: token,
        client_id,
        client_secret,
    };
    let mut connections = Vec::with_capacity(connection_count);
    for index in 0..connection_count {
        tracing::info!("Building API connection {}/{}", index + 1, connection_count);
        let connection = ApiConnection::connect(&connection_config)
            .await
            .context("creating api connection")?;
        connections.push(Arc::new(connection));
    }

    let runner = Runner::new(run_id, output_path, connections);
    let store = Arc::new(store);
    if let Err(err) = runner.run(&store).await {
        tracing::error!("Running load test: {}", err);
        std::process::exit(1);
    }

    Ok(())
}
