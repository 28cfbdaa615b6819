use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use universal_gateway::config::GatewayConfig;
use universal_gateway::Gateway;

/// Universal Gateway: one origin for every app dev server
#[derive(Parser)]
#[command(name = "universal-gateway", version, about)]
struct Cli {
    /// Path to configuration file (.hcl); built-in routes when omitted
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<String>,

    /// Override listen address (e.g., 0.0.0.0:8080)
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file without starting the gateway
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long, default_value = "gateway.hcl")]
        config: String,
    },
    /// Print the resolved route table
    Routes {
        /// Path to configuration file (.hcl)
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> universal_gateway::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Validate { config }) => return validate_config(config).await,
        Some(Commands::Routes { config }) => return print_routes(config.as_deref()).await,
        None => {}
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    tracing::info!("Universal Gateway v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(cli.config.as_deref()).await?;
    config.apply_process_env()?;

    // Override listen address if provided
    if let Some(listen) = &cli.listen {
        config.listen = listen.clone();
    }

    let gateway = Gateway::new(config)?;
    gateway.start().await?;

    tracing::info!("Gateway ready, press Ctrl+C to stop");

    gateway.wait_for_shutdown().await
}

/// Built-in defaults, or the given HCL file
async fn load_config(path: Option<&str>) -> universal_gateway::Result<GatewayConfig> {
    match path {
        Some(path) => {
            tracing::info!(config = path, "Loading configuration");
            GatewayConfig::from_file(path).await
        }
        None => {
            tracing::info!("No config file given, using built-in routes");
            Ok(GatewayConfig::default())
        }
    }
}

/// Validate a configuration file and print diagnostics
async fn validate_config(path: &str) -> universal_gateway::Result<()> {
    if !std::path::Path::new(path).exists() {
        eprintln!("✗ Config file not found: {}", path);
        std::process::exit(1);
    }

    // Parse
    let config = match GatewayConfig::from_file(path).await {
        Ok(c) => {
            println!("✓ Config parsed successfully ({})", path);
            c
        }
        Err(e) => {
            eprintln!("✗ Parse error: {}", e);
            std::process::exit(1);
        }
    };

    // Validate
    if let Err(e) = config.validate() {
        eprintln!("✗ Validation error: {}", e);
        std::process::exit(1);
    }

    // Print summary
    println!("✓ Configuration is valid");
    println!();
    println!("  Listen:      {} ({})", config.listen, config.environment);
    println!("  Upstream:    {}", config.upstream_host);
    println!("  Default app: {}", config.default_app);
    println!("  Apps:        {}", config.apps.len());
    for (name, app) in &config.apps {
        println!("    - {} → :{} ({} routes)", name, app.port, app.routes.len());
    }
    println!("  APIs:        {}", config.apis.len());
    for (name, api) in &config.apis {
        println!("    - {} → :{} ({} routes)", name, api.port, api.routes.len());
    }
    println!("  Shared assets: {}", config.shared_assets.len());
    println!(
        "  Debug route: {}",
        if config.debug_enabled() { "exposed" } else { "hidden" }
    );

    Ok(())
}

/// Print every prefix with its target, in match order
async fn print_routes(path: Option<&str>) -> universal_gateway::Result<()> {
    let mut config = match path {
        Some(path) => GatewayConfig::from_file(path).await?,
        None => GatewayConfig::default(),
    };
    config.apply_process_env()?;
    let gateway = Gateway::new(config)?;
    let table = gateway.route_table();

    println!("{:<20} {:<8} {:<10} APP", "PREFIX", "PORT", "KIND");
    for entry in table.entries() {
        let kind = match entry.kind {
            universal_gateway::router::RouteKind::Frontend => "frontend",
            universal_gateway::router::RouteKind::Api => "api",
        };
        println!(
            "{:<20} {:<8} {:<10} {}",
            entry.prefix, entry.port, kind, entry.app
        );
    }
    println!();
    println!(
        "{} routes; shared assets and upgrades default to port {}",
        table.len(),
        table.default_port()
    );

    Ok(())
}
