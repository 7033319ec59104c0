use anyhow::Context;
use clap::Parser;
use toolchain_bins::app::commands;
use toolchain_bins::utils::error::{BinsError, ErrorSeverity};
use toolchain_bins::utils::logger;
use toolchain_bins::{Cli, Command};

const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting toolchain-bins {}", env!("CARGO_PKG_VERSION"));
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }
    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let outcome = tokio::select! {
        result = run(cli) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::warn!("⚠️  Interrupted by user");
            eprintln!("⚠️  Interrupted");
            std::process::exit(EXIT_INTERRUPTED);
        }
    };

    if let Err(e) = outcome {
        report_failure(&e);
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(cli: Cli) -> toolchain_bins::Result<()> {
    match cli.command {
        Command::Fetch(args) => commands::fetch(args, cli.monitor).await.map(|_| ()),
        Command::Dedupe(args) => commands::dedupe(args).await,
        Command::HardlinkArchive(args) => commands::hardlink_archive(args).await.map(|_| ()),
        Command::Expand(args) => commands::expand(args).await.map(|_| ()),
        Command::Split(args) => commands::split(args).await,
        Command::Join(args) => commands::join(args).await.map(|_| ()),
        Command::Checksum(args) => commands::checksum(args).await,
        Command::Manifest(args) => commands::update_manifest(args),
        Command::Bench(args) => commands::bench(args).await.map(|_| ()),
    }
}

fn report_failure(e: &BinsError) {
    tracing::error!(
        "❌ Failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
}
