//! ecscale - ECS cluster scale-in
//!
//! ## Usage
//!
//! ```bash
//! # One pass, apply decisions (also what a scheduled trigger runs)
//! ecscale
//!
//! # One pass, log decisions only
//! ecscale dry
//!
//! # Repeat every 5 minutes, JSON report per pass
//! ecscale --interval 300 --output json
//! ```

use clap::{Parser, ValueEnum};
use ecscale_orchestrator::{aws, RunMode, ScalerConfig, SweepReport, Sweeper};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run mode argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Drain and terminate hosts
    Normal,
    /// Log what would be done
    Dry,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Normal => RunMode::Normal,
            ModeArg::Dry => RunMode::Dry,
        }
    }
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One summary line per cluster
    Text,
    /// Full sweep report as JSON
    Json,
}

/// ecscale: scale-in for ECS clusters on Auto Scaling groups
#[derive(Parser)]
#[command(name = "ecscale")]
#[command(about = "Drain idle and under-utilized ECS hosts, terminate drained ones", long_about = None)]
struct Cli {
    /// Run mode
    #[arg(value_enum, default_value_t = ModeArg::Normal)]
    mode: ModeArg,

    /// AWS region, resolved by the SDK provider chain when absent
    #[arg(long)]
    region: Option<String>,

    /// Group CPU (%) below which a memory-pressure scale-in may happen
    #[arg(long, env = "ECSCALE_SCALE_IN_CPU_TH", default_value_t = ecscale_orchestrator::DEFAULT_SCALE_IN_CPU_TH)]
    cpu_threshold: f64,

    /// Cluster memory reservation (%) below which a memory-pressure scale-in may happen
    #[arg(long, env = "ECSCALE_SCALE_IN_MEM_TH", default_value_t = ecscale_orchestrator::DEFAULT_SCALE_IN_MEM_TH)]
    mem_threshold: f64,

    /// Ceiling (%) for current and projected memory reservation
    #[arg(long, env = "ECSCALE_FUTURE_MEM_TH", default_value_t = ecscale_orchestrator::DEFAULT_FUTURE_MEM_TH)]
    future_threshold: f64,

    /// Skip clusters whose ARN contains this
    #[arg(long, env = "ECSCALE_EXCLUDE", default_value = ecscale_orchestrator::DEFAULT_EXCLUDE_SUBSTRING)]
    exclude: String,

    /// Repeat the sweep every N seconds instead of running once
    #[arg(long)]
    interval: Option<u64>,

    /// Report format printed after each pass
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, env = "ECSCALE_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn scaler_config(&self) -> ScalerConfig {
        ScalerConfig::default()
            .with_cpu_threshold(self.cpu_threshold)
            .with_mem_threshold(self.mem_threshold)
            .with_future_threshold(self.future_threshold)
            .with_exclude_substring(self.exclude.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // File writer guard must live until exit to flush buffered lines
    let (file_layer, _guard) = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ecscale.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecscale=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    let config = cli.scaler_config();
    config.validate()?;

    let mode = RunMode::from(cli.mode);

    info!("========================================");
    info!("ecscale starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Mode: {}", mode);
    info!(
        "Thresholds: cpu<{} mem<{} future<{}",
        config.scale_in_cpu_th, config.scale_in_mem_th, config.future_mem_th
    );
    info!("========================================");

    let sdk_config = aws::load_config(cli.region.clone()).await;
    let collaborators = aws::collaborators(&sdk_config, &config.exclude_substring);
    let sweeper = Sweeper::new(collaborators, config);

    match cli.interval {
        None => {
            let report = sweeper.run(mode).await;
            print_report(&report, cli.output)?;
        }
        Some(secs) => {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
            info!(interval_secs = secs, "Repeating sweep, Ctrl+C to stop");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = sweeper.run(mode).await;
                        print_report(&report, cli.output)?;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        warn!("Interrupted, stopping");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_report(report: &SweepReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}
