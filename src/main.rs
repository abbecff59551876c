use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use gxyarchiver::bundler::{self, BundleLayout, BundleOptions};
use gxyarchiver::cli::args::{Cli, Commands, ConfigAction, OutputFormat};
use gxyarchiver::cli::output;
use gxyarchiver::common::config::{gb_to_bytes, Config};
use gxyarchiver::fixture::{self, FixtureOptions};
use gxyarchiver::lifecycle::{self, BatchOptions};
use gxyarchiver::remote::GalaxyClient;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let _log_guard = init_logging(&cli)?;
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Archive {
            ref history_id,
            ref history_id_file,
            num_concurrent,
            ignore_errors: _,
            no_ignore_errors,
        } => cmd_archive(
            &cli,
            &config,
            history_id.clone(),
            history_id_file.clone(),
            num_concurrent,
            !no_ignore_errors,
        ),

        Commands::Bundle {
            ref folder_path,
            required_size_gb,
            continual,
            quarantine,
            keep_sources,
            no_compress,
        } => cmd_bundle(
            &cli,
            &config,
            folder_path,
            required_size_gb,
            continual,
            quarantine,
            keep_sources,
            no_compress,
        ),

        Commands::Verify {
            ref folder_path,
            ref quarantine_path,
        } => cmd_verify(&cli, &config, folder_path, quarantine_path.as_deref()),

        Commands::Stage {
            ref folder_path,
            count,
            min_size,
            max_size,
        } => cmd_stage(&cli, folder_path, count, min_size, max_size),

        Commands::Config { ref action } => cmd_config(&cli, &config, action),

        Commands::Completions { ref shell } => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            let shell = match shell {
                gxyarchiver::cli::args::CompletionShell::Bash => clap_complete::Shell::Bash,
                gxyarchiver::cli::args::CompletionShell::Zsh => clap_complete::Shell::Zsh,
                gxyarchiver::cli::args::CompletionShell::Fish => clap_complete::Shell::Fish,
            };
            clap_complete::generate(shell, &mut cmd, "gxyarchiver", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Logs go to stderr, and also to `--log-file` when given.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = if cli.verbose {
        EnvFilter::new("gxyarchiver=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    match &cli.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log dir: {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            Ok(None)
        }
    }
}

fn show_progress(cli: &Cli) -> bool {
    !cli.quiet && matches!(cli.format, OutputFormat::Human)
}

fn build_client(cli: &Cli, config: &Config) -> Result<GalaxyClient> {
    let api_url = cli.api_url.as_deref().unwrap_or(&config.api_url);
    let api_key = cli
        .api_key
        .as_deref()
        .or(config.api_key.as_deref())
        .context("No API key: pass --api-key, set GALAXY_API_KEY, or add api_key to the config file")?;

    let client = GalaxyClient::new(api_url, api_key, config.http_timeout(), config.retry.clone())?;
    Ok(client)
}

fn existing_folder(folder_path: &std::path::Path) -> Result<std::path::PathBuf> {
    if !folder_path.is_dir() {
        anyhow::bail!("Folder does not exist: {}", folder_path.display());
    }
    std::fs::canonicalize(folder_path)
        .with_context(|| format!("Failed to resolve folder: {}", folder_path.display()))
}

// ─── Archive ──────────────────────────────────────────────────────────────────

fn cmd_archive(
    cli: &Cli,
    config: &Config,
    history_id: Option<String>,
    history_id_file: Option<std::path::PathBuf>,
    num_concurrent: usize,
    ignore_errors: bool,
) -> Result<()> {
    let history_ids = match (history_id, history_id_file) {
        (_, Some(path)) => lifecycle::read_history_ids(&path)
            .with_context(|| format!("Failed to read history ids: {}", path.display()))?,
        (Some(id), None) => vec![id],
        (None, None) => {
            anyhow::bail!("Either --history-id or --history-id-file must be provided.")
        }
    };

    let client = build_client(cli, config)?;
    let options = BatchOptions {
        concurrency: num_concurrent,
        ignore_errors,
        show_progress: show_progress(cli) && history_ids.len() > 1,
    };

    let report =
        lifecycle::archive_histories(&client, &history_ids, &config.export_settings(), &options)?;

    match cli.format {
        OutputFormat::Human if !cli.quiet => output::print_batch_report(&report),
        OutputFormat::Human => {}
        OutputFormat::Json => output::print_batch_json(&report),
    }

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{} of {} histories were not archived", failed, history_ids.len());
    }
    Ok(())
}

// ─── Bundle ───────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn cmd_bundle(
    cli: &Cli,
    config: &Config,
    folder_path: &std::path::Path,
    required_size_gb: Option<f64>,
    continual: bool,
    quarantine: bool,
    keep_sources: bool,
    no_compress: bool,
) -> Result<()> {
    let base = existing_folder(folder_path)?;
    let layout = BundleLayout::new(&base);

    let size_gb = required_size_gb.unwrap_or(config.default_tar_size_gb);
    let target_size = gb_to_bytes(size_gb);
    if target_size == 0 {
        anyhow::bail!("Required size must be positive, got {} GB", size_gb);
    }

    let client = build_client(cli, config)?;
    let options = BundleOptions {
        target_size,
        file_pattern: config.export_file_pattern.clone(),
        remove_sources: !keep_sources,
        compress: !no_compress,
        quarantine_dir: quarantine.then(|| layout.quarantine_dir.clone()),
        show_progress: show_progress(cli),
    };

    let reports = if continual {
        bundler::run_continual(&client, &layout, &options)?
    } else {
        bundler::run_once(&client, &layout, &options)?
            .into_iter()
            .collect()
    };

    match cli.format {
        OutputFormat::Human if !cli.quiet => output::print_bundle_reports(&reports),
        OutputFormat::Human => {}
        OutputFormat::Json => output::print_bundle_json(&reports),
    }

    if reports.iter().any(|r| !r.removal_errors.is_empty()) {
        anyhow::bail!("Some bundled source files could not be removed");
    }
    Ok(())
}

// ─── Verify ───────────────────────────────────────────────────────────────────

fn cmd_verify(
    cli: &Cli,
    config: &Config,
    folder_path: &std::path::Path,
    quarantine_path: Option<&std::path::Path>,
) -> Result<()> {
    let base = existing_folder(folder_path)?;
    let layout = BundleLayout::new(&base);
    let client = build_client(cli, config)?;

    let report = bundler::scan_and_quarantine(
        &client,
        &layout.export_dir,
        &config.export_file_pattern,
        quarantine_path,
    )?;

    match cli.format {
        OutputFormat::Human if !cli.quiet => output::print_quarantine_report(&report),
        OutputFormat::Human => {}
        OutputFormat::Json => output::print_quarantine_json(&report),
    }
    Ok(())
}

// ─── Stage ────────────────────────────────────────────────────────────────────

fn cmd_stage(
    cli: &Cli,
    folder_path: &std::path::Path,
    count: usize,
    min_size: u64,
    max_size: u64,
) -> Result<()> {
    let layout = BundleLayout::new(folder_path);
    let options = FixtureOptions {
        count,
        min_size,
        max_size,
        ..FixtureOptions::default()
    };
    let files = fixture::generate_export_files(&layout.export_dir, &options)?;

    if !cli.quiet {
        output::print_staged(&files, &layout.export_dir);
    }
    Ok(())
}

// ─── Config ───────────────────────────────────────────────────────────────────

fn cmd_config(cli: &Cli, config: &Config, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut shown = config.clone();
            if let Some(url) = &cli.api_url {
                shown.api_url = url.clone();
            }
            if shown.api_key.is_some() || cli.api_key.is_some() {
                shown.api_key = Some("********".to_string());
            }
            let toml = toml::to_string_pretty(&shown).context("Failed to serialize config")?;
            println!("{}", toml);
        }
        ConfigAction::Init => {
            let path = cli.config.clone().unwrap_or_else(Config::config_path);
            if path.exists() {
                println!("Config already exists at {}", path.display());
            } else {
                let path = Config::default().save(Some(&path))?;
                println!("Wrote default config to {}", path.display());
            }
        }
    }
    Ok(())
}
