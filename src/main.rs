//! Command-line front end.
//!
//! Subcommands:
//!   train    -- Train on a CSV file, optionally save the model and predict
//!   predict  -- Predict with a saved model

use clap::{Parser, Subcommand};
use ev_range::preprocessing::RawRecord;
use ev_range::session::{ChartCadence, SessionObserver, SessionState, TrainingReport};
use ev_range::trainer::EpochMetrics;
use ev_range::{CpuBackend, Session, SessionConfig};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ev-range", about = "Electric-vehicle driving-range predictor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model on a CSV file of EV specifications.
    Train {
        /// CSV file with a header row.
        #[arg(long)]
        data: PathBuf,

        /// TOML configuration; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the fitted pipeline and model here.
        #[arg(long)]
        save: Option<PathBuf>,

        /// JSON file with one record or an array of records to predict after training.
        #[arg(long)]
        predict: Option<PathBuf>,
    },

    /// Predict ranges with a saved model.
    Predict {
        /// File written by `train --save`.
        #[arg(long)]
        model: PathBuf,

        /// JSON file with one record or an array of records.
        #[arg(long)]
        input: PathBuf,
    },
}

/// Logs transitions, and epochs at the chart cadence.
struct ProgressLog {
    cadence: ChartCadence,
}

impl SessionObserver for ProgressLog {
    fn on_state(&mut self, state: &SessionState) {
        match state {
            SessionState::Failed { .. } => tracing::error!("{state}"),
            _ => tracing::info!("{state}"),
        }
    }

    fn on_epoch(&mut self, m: &EpochMetrics) -> ControlFlow<()> {
        if self.cadence.should_redraw(m.epoch) {
            tracing::info!(
                "epoch {:3} | loss={:.4} val_loss={:.4} mae={:.4} val_mae={:.4}",
                m.epoch,
                m.loss,
                m.val_loss,
                m.mae,
                m.val_mae
            );
        }
        ControlFlow::Continue(())
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Train {
            data,
            config,
            save,
            predict,
        } => train(&data, config.as_deref(), save.as_deref(), predict.as_deref()),
        Command::Predict { model, input } => predict(&model, &input),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn train(
    data: &Path,
    config: Option<&Path>,
    save: Option<&Path>,
    predict_input: Option<&Path>,
) -> CliResult {
    let config = match config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    let session = Session::new(config)?;
    let mut progress = ProgressLog {
        cadence: session.chart_cadence(),
    };

    let report = session.run_file(data, &mut progress)?;
    log_report(&report);

    if let Some(path) = save {
        session.save_artifacts(path)?;
    }
    if let Some(path) = predict_input {
        predict_records(&session, path)?;
    }
    Ok(())
}

fn predict(model: &Path, input: &Path) -> CliResult {
    let session = Session::<CpuBackend>::load(SessionConfig::default(), model)?;
    predict_records(&session, input)
}

fn log_report(report: &TrainingReport) {
    tracing::info!(
        "trained on {} rows, tested on {} | test loss={:.4} mae={:.4}",
        report.train_rows,
        report.test_rows,
        report.evaluation.loss,
        report.evaluation.mae
    );
}

fn predict_records(session: &Session, path: &Path) -> CliResult {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("failed reading {}: {e}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&raw)?;
    let items = match json {
        serde_json::Value::Array(items) => items,
        single => vec![single],
    };

    for (i, item) in items.iter().enumerate() {
        let record = RawRecord::from_json(item)
            .ok_or_else(|| format!("record {i} is not a JSON object"))?;
        match session.predict(&record)? {
            Some(km) => println!("{km}"),
            None => tracing::warn!("session not ready; record {i} skipped"),
        }
    }
    Ok(())
}
