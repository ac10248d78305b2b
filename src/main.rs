mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands, KindArg};
use tl_core::config::Config;
use tl_core::mime_for_extension;
use tl_media::{FfmpegBackend, ToolRegistry};
use tl_server::context::AppContext;
use tl_server::orchestrator::{UploadOutcome, UploadedFile};

/// Load the config file strictly when it exists, defaults otherwise.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) if p.exists() => {
            Config::load(p).with_context(|| format!("failed to load config {}", p.display()))
        }
        _ => Ok(Config::load_or_default(path)),
    }
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting travelog media server");
    tl_server::start(config).await?;
    Ok(())
}

async fn process_file(
    input: &Path,
    kind: KindArg,
    output: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(root) = output {
        config.uploads.root = root.to_path_buf();
    }
    let layout = config.uploads.layout();
    layout
        .ensure()
        .with_context(|| format!("failed to create upload root {}", layout.root.display()))?;

    let ext = input.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .context("input has no file name")?;
    let staged_name = if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{}", ext.to_ascii_lowercase())
    };

    // The orchestrator consumes what it is given, so hand it a copy.
    let staged = layout.temp.join(&staged_name);
    let size = tokio::fs::copy(input, &staged)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;

    let file = UploadedFile {
        temp_path: staged,
        declared_mime_type: mime_for_extension(ext)
            .unwrap_or("application/octet-stream")
            .to_string(),
        original_name: input.display().to_string(),
        size,
    };

    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    let backend = Arc::new(FfmpegBackend::new(tools.clone(), config.video.clone()));
    let ctx = AppContext::new(config, tools, backend);

    let outcome = ctx
        .orchestrator
        .handle_upload(file, kind.into(), false)
        .await
        .with_context(|| format!("failed to process {}", input.display()))?;

    let root = &ctx.orchestrator.layout().root;
    match outcome {
        UploadOutcome::Image { url, .. } | UploadOutcome::Avatar { url, .. } => {
            println!("{}", root.join(url).display());
        }
        UploadOutcome::Video(response) => {
            println!("video:     {}", root.join(&response.video_url).display());
            println!("cover:     {}", root.join(&response.cover_url).display());
            println!("thumbnail: {}", root.join(&response.thumbnail_url).display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "travelog=trace,tl_server=trace,tl_media=trace,tl_core=debug,tower_http=debug"
                .to_string()
        } else {
            "travelog=debug,tl_server=debug,tl_media=debug,tl_core=info,tower_http=info"
                .to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Process {
            input,
            kind,
            output,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(process_file(
                &input,
                kind,
                output.as_deref(),
                cli.config.as_deref(),
            ))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("travelog {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path)?;
    let tools = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Video uploads need ffmpeg and ffprobe.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load(p)
                .with_context(|| format!("invalid config {}", p.display()))?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Upload root: {}", config.uploads.root.display());
    println!(
        "  Images: max width {}, quality {}",
        config.images.max_width, config.images.quality
    );
    println!(
        "  Avatar: {}x{}, quality {}",
        config.avatar.size, config.avatar.size, config.avatar.quality
    );
    println!(
        "  Video: {} {} @ {}, width {}",
        config.video.codec, config.video.preset, config.video.video_bitrate, config.video.width
    );
    println!(
        "  Jobs: retention {}s, {} concurrent transcode(s)",
        config.jobs.retention_secs, config.jobs.max_concurrent_transcodes
    );

    let warnings = config.validate();
    for warning in &warnings {
        println!("  ⚠ {warning}");
    }

    Ok(())
}
