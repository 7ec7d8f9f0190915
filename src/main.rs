mod cli;

use hlsrelay::{config, server};
use hlsrelay_db::pool::init_pool;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags win over the file
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting hlsrelay");

    // Data directory: next to the config file, or the working directory
    let data_dir = config_path
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let db_path = config
        .database
        .path
        .clone()
        .unwrap_or_else(|| data_dir.join("hlsrelay.db"));
    let db_path_str = db_path.to_string_lossy();
    tracing::info!("Initializing overlay store at {}", db_path_str);
    let db_pool = init_pool(&db_path_str)?;

    std::fs::create_dir_all(&config.streams.root).with_context(|| {
        format!("Failed to create streams root {:?}", config.streams.root)
    })?;

    let ctx = server::AppContext::new(config, db_pool);

    // Registry state does not survive restarts; old output is only reported.
    match ctx.orchestrator.registry().count_directories() {
        Ok(count) if count > 0 => {
            tracing::info!(
                "Found {} stream directories from a previous run under {:?}",
                count,
                ctx.orchestrator.registry().root()
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Failed to scan streams root: {}", e),
    }

    server::start_server(ctx).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hlsrelay=trace,hlsrelay_av=trace,hlsrelay_db=debug,tower_http=debug".to_string()
        } else {
            "hlsrelay=debug,hlsrelay_av=debug,hlsrelay_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hlsrelay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let tools = hlsrelay_av::check_tools(config.tools.ffmpeg_path.as_deref());

    println!("Checking external tools...\n");

    let mut all_ok = true;
    for tool in &tools {
        if tool.available {
            println!(
                "  [OK] {} - {}",
                tool.name,
                tool.version.as_deref().unwrap_or("unknown version")
            );
            if let Some(ref path) = tool.path {
                println!("       {}", path.display());
            }
        } else {
            println!("  [MISSING] {}", tool.name);
            all_ok = false;
        }
    }

    println!();
    if all_ok {
        println!("All tools available.");
        Ok(())
    } else {
        anyhow::bail!("ffmpeg is required for conversions")
    }
}

fn validate_config(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let source = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("<defaults>"));

    println!("Configuration is valid: {}", source.display());
    println!("  Listen:       {}:{}", config.server.host, config.server.port);
    println!("  Streams root: {}", config.streams.root.display());
    println!(
        "  Readiness:    {}s deadline, {}ms poll",
        config.streams.readiness_timeout_secs, config.streams.poll_interval_ms
    );
    println!(
        "  Segments:     {}s x {} ({} / {})",
        config.transcoder.segment_duration_secs,
        config.transcoder.playlist_size,
        config.transcoder.video_codec,
        config.transcoder.audio_codec
    );

    Ok(())
}
