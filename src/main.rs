use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use vitalrs::{
    init_logging, AppConfig, HealthMonitor, LogLevel, MonitorTick, Priority, RiskLevel,
    VitalsError, VitalsSimulator,
};

/// VitalRS - Wearable Health Monitoring Pipeline
///
/// Simulates vital-sign readings from a wearable device, scores them with an
/// isolation-forest anomaly model, and derives prioritized recommendations.
#[derive(Parser)]
#[command(name = "vitalrs")]
#[command(version = "0.1.0")]
#[command(about = "Wearable health monitoring pipeline", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run monitoring cycles against a freshly trained model
    Monitor {
        /// Number of monitoring cycles to run
        #[arg(short, long, default_value = "10")]
        ticks: usize,

        /// Inject deterministic emergency readings
        #[arg(short, long)]
        emergency: bool,

        /// Retrain the model every N cycles
        #[arg(short, long, value_name = "N")]
        retrain_every: Option<usize>,

        /// Restore model state from this file after bootstrap
        #[arg(long, value_name = "FILE")]
        load_model: Option<PathBuf>,

        /// Save the final model state to this file
        #[arg(long, value_name = "FILE")]
        save_model: Option<PathBuf>,

        /// Emit each cycle as a JSON line instead of formatted output
        #[arg(short, long)]
        json: bool,
    },

    /// Generate a batch of synthetic readings
    Simulate {
        /// Number of readings (15 simulated minutes apart)
        #[arg(short = 'n', long, default_value = "96")]
        count: usize,

        /// Write JSON here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// RNG seed for reproducible batches
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Train on bootstrap history and display model evaluation
    Metrics {
        /// Emit the report as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[derive(Tabled)]
struct ClassRow {
    #[tabled(rename = "Class")]
    class: &'static str,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "F1")]
    f1: String,
    #[tabled(rename = "Support")]
    support: usize,
}

#[derive(Tabled)]
struct ConfusionRow {
    #[tabled(rename = "Actual \\ Predicted")]
    actual: &'static str,
    #[tabled(rename = "Normal")]
    normal: usize,
    #[tabled(rename = "Anomaly")]
    anomaly: usize,
}

fn main() {
    if let Err(err) = run() {
        let message = match err.downcast_ref::<VitalsError>() {
            Some(vitals_err) => vitals_err.user_message(),
            None => err.to_string(),
        };
        eprintln!("{}", message.red());
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_or_default(&config_path)?;

    if cli.verbose > 0 {
        config.log.level = match cli.verbose {
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        };
    }
    init_logging(&config.log)?;

    match cli.command {
        Commands::Monitor {
            ticks,
            emergency,
            retrain_every,
            load_model,
            save_model,
            json,
        } => run_monitor(
            config,
            ticks,
            emergency,
            retrain_every,
            load_model,
            save_model,
            json,
        ),
        Commands::Simulate {
            count,
            output,
            seed,
        } => run_simulate(config, count, output, seed),
        Commands::Metrics { json } => run_metrics(config, json),
    }
}

fn run_monitor(
    config: AppConfig,
    ticks: usize,
    emergency: bool,
    retrain_every: Option<usize>,
    load_model: Option<PathBuf>,
    save_model: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if !json {
        println!("{}", "Initializing health monitor...".green().bold());
    }
    let mut monitor = HealthMonitor::initialize(config.monitor.clone())?;

    if let Some(path) = &load_model {
        monitor.load_model(path)?;
        if !json {
            println!("  Model state restored from {}", path.display());
        }
    }

    for i in 1..=ticks {
        if let Some(every) = retrain_every {
            if every > 0 && i > 1 && (i - 1) % every == 0 {
                match monitor.retrain() {
                    Ok(metrics) => {
                        if !json {
                            println!(
                                "{}",
                                format!(
                                    "  Model retrained on {} readings (accuracy {:.3})",
                                    metrics.total_samples, metrics.accuracy
                                )
                                .blue()
                            );
                        }
                    }
                    Err(err) => {
                        eprintln!("{}", err.user_message().yellow());
                    }
                }
            }
        }

        let tick = monitor.tick(emergency)?;
        if json {
            println!("{}", serde_json::to_string(&tick)?);
        } else {
            print_tick(i, ticks, &tick);
        }
    }

    if let Some(path) = &save_model {
        monitor.save_model(path)?;
        if !json {
            println!(
                "{}",
                format!("✓ Model state saved to {}", path.display()).green()
            );
        }
    }

    Ok(())
}

fn print_tick(index: usize, total: usize, tick: &MonitorTick) {
    let reading = &tick.reading;
    let verdict = &tick.verdict;

    let status = if verdict.is_anomaly {
        verdict.status.red().bold()
    } else {
        verdict.status.green()
    };
    let risk = match verdict.risk_level {
        RiskLevel::High => verdict.risk_level.to_string().red().bold(),
        RiskLevel::Medium => verdict.risk_level.to_string().yellow(),
        RiskLevel::Low => verdict.risk_level.to_string().green(),
    };
    let priority = match tick.recommendations.priority {
        Priority::High => tick.recommendations.priority.to_string().red().bold(),
        Priority::Medium => tick.recommendations.priority.to_string().yellow(),
        Priority::Low => tick.recommendations.priority.to_string().green(),
    };

    println!(
        "[{}/{}] {}  HR {:>3}  SpO2 {:>5.1}  Temp {:>5.1}  Score {:>3}  {} (risk {}, priority {})",
        index,
        total,
        reading.timestamp.format("%H:%M:%S"),
        reading.heart_rate,
        reading.blood_oxygen,
        reading.temperature,
        reading.health_score,
        status,
        risk,
        priority,
    );
    for line in &tick.recommendations.recommendations {
        println!("      • {}", line.dimmed());
    }
}

fn run_simulate(
    config: AppConfig,
    count: usize,
    output: Option<PathBuf>,
    seed: Option<u64>,
) -> Result<()> {
    let mut sim_config = config.monitor.simulator.clone();
    if seed.is_some() {
        sim_config.seed = seed;
    }

    let mut simulator = VitalsSimulator::new(sim_config);
    let readings = simulator.generate_batch(count, None);
    let json = serde_json::to_string_pretty(&readings)?;

    match output {
        Some(path) => {
            fs::write(&path, json)?;
            println!(
                "{}",
                format!("✓ Wrote {} readings to {}", readings.len(), path.display()).green()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn run_metrics(config: AppConfig, json: bool) -> Result<()> {
    if !json {
        println!("{}", "Training model on bootstrap history...".green().bold());
    }
    let monitor = HealthMonitor::initialize(config.monitor.clone())?;
    let report = monitor.model_metrics();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let Some(metrics) = report.metrics else {
        println!("{}", "Model not trained yet".yellow());
        return Ok(());
    };

    println!();
    println!("{}", "Model evaluation".bold());
    println!(
        "  Accuracy: {:.3}   Samples: {}   Detected anomalies: {}   Actual anomalies: {}",
        metrics.accuracy,
        metrics.total_samples,
        metrics.detected_anomalies,
        metrics.actual_anomalies
    );

    let [[tn, fp], [fn_, tp]] = metrics.confusion_matrix;
    let confusion = vec![
        ConfusionRow {
            actual: "Normal",
            normal: tn,
            anomaly: fp,
        },
        ConfusionRow {
            actual: "Anomaly",
            normal: fn_,
            anomaly: tp,
        },
    ];
    println!("{}", Table::new(confusion));

    let report_rows = vec![
        ClassRow {
            class: "Normal",
            precision: format!("{:.3}", metrics.classification_report.normal.precision),
            recall: format!("{:.3}", metrics.classification_report.normal.recall),
            f1: format!("{:.3}", metrics.classification_report.normal.f1_score),
            support: metrics.classification_report.normal.support,
        },
        ClassRow {
            class: "Anomaly",
            precision: format!("{:.3}", metrics.classification_report.anomaly.precision),
            recall: format!("{:.3}", metrics.classification_report.anomaly.recall),
            f1: format!("{:.3}", metrics.classification_report.anomaly.f1_score),
            support: metrics.classification_report.anomaly.support,
        },
    ];
    println!("{}", Table::new(report_rows));

    Ok(())
}
