use clap::Args;
use farm_biosecurity::assessment::{AssessmentService, ScoringPolicy};
use farm_biosecurity::config::AppConfig;
use farm_biosecurity::error::AppError;
use farm_biosecurity::model::{dataset, train, ModelBundle, TrainingOptions, TrainingReport};
use farm_biosecurity::telemetry;
use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct TrainArgs {
    /// Number of synthetic rows to generate (defaults to APP_TRAINING_SAMPLES)
    #[arg(long)]
    pub(crate) samples: Option<usize>,
    /// Seed for generation, splitting and fold assignment
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Cross-validation folds
    #[arg(long)]
    pub(crate) folds: Option<usize>,
    /// Train from an existing labeled CSV instead of generating one
    #[arg(long)]
    pub(crate) data: Option<PathBuf>,
    /// Where to write the bundle (defaults to APP_MODEL_PATH)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct DatasetArgs {
    /// Number of rows to generate
    #[arg(long, default_value_t = 2000)]
    pub(crate) samples: usize,
    /// Generator seed
    #[arg(long, default_value_t = 42)]
    pub(crate) seed: u64,
    /// CSV destination; stdout when omitted
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Questionnaire JSON file, or `-` for stdin
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Model bundle to score with; the rubric alone is used when omitted
    #[arg(long)]
    pub(crate) model: Option<PathBuf>,
}

pub(crate) fn run_train(args: TrainArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let options = TrainingOptions {
        samples: args.samples.unwrap_or(config.training.samples),
        seed: args.seed.unwrap_or(config.training.seed),
        folds: args.folds.unwrap_or(config.training.folds),
        ..config.training.clone()
    };
    let output = args.output.unwrap_or(config.model.bundle_path);

    let rows = match &args.data {
        Some(path) => dataset::load_csv(path)?,
        None => dataset::generate(options.samples, options.seed),
    };
    println!(
        "Training on {} rows ({}-fold cross-validation, seed {})",
        rows.len(),
        options.folds,
        options.seed
    );

    let bundle = train(&rows, &options)?;
    bundle.save(&output)?;

    render_report(bundle.report());
    println!("Saved {} model to {}", bundle.family().label(), output.display());
    Ok(())
}

fn render_report(report: &TrainingReport) {
    println!(
        "{:<22} {:>8} {:>8} {:>9} {:>9} {:>8}",
        "candidate", "cv_r2", "cv_std", "val_r2", "val_mse", "val_mae"
    );
    for candidate in &report.candidates {
        let marker = if candidate.family == report.selected {
            "*"
        } else {
            " "
        };
        println!(
            "{marker}{:<21} {:>8.4} {:>8.4} {:>9.4} {:>9.3} {:>8.3}",
            candidate.family.key(),
            candidate.cv_r2,
            candidate.cv_r2_std,
            candidate.validation_r2,
            candidate.validation_mse,
            candidate.validation_mae
        );
    }
}

pub(crate) fn run_dataset(args: DatasetArgs) -> Result<(), AppError> {
    let rows = dataset::generate(args.samples, args.seed);
    match args.output {
        Some(path) => {
            dataset::save_csv(&path, &rows)?;
            println!("Wrote {} rows to {}", rows.len(), path.display());
        }
        None => dataset::write_csv(io::stdout().lock(), &rows)?,
    }
    Ok(())
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let raw = if args.input.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(&args.input)?
    };
    let payload: Value = serde_json::from_str(&raw)
        .map_err(|err| AppError::BadRequest(format!("input is not valid JSON: {err}")))?;

    let service = match args.model {
        Some(path) => {
            AssessmentService::with_model(ScoringPolicy::ModelRequired, ModelBundle::load(&path)?)
        }
        None => AssessmentService::new(ScoringPolicy::RulesOnly),
    };
    let report = service.score(&payload)?;

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| AppError::Io(io::Error::new(io::ErrorKind::Other, err)))?;
    println!("{rendered}");
    Ok(())
}
