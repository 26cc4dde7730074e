#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use log::{error, info};
use std::path::PathBuf;
use std::process;

use riskscreen::artifacts::ArtifactBundle;
use riskscreen::config::{ScreenConfig, check_threshold};
use riskscreen::data::{load_patient_records, write_predictions};
use riskscreen::pipeline::{RiskDecision, ScreeningContext, ScreeningMode};
use riskscreen::record::{
    AGE_RANGE, BMI_RANGE, EducationLevel, LaborStatus, MaritalStatus, PatientRecord, Sex,
    WAIST_RANGE, YesNo,
};
use riskscreen::report::{render_failure, render_screening, to_json};

#[derive(Clone, Copy, ValueEnum)]
pub enum ScreeningModeCli {
    /// Rebalanced classifier, threshold 0.3
    HighSensitivity,
    /// Default classifier, threshold 0.5
    Standard,
}

impl From<ScreeningModeCli> for ScreeningMode {
    fn from(mode: ScreeningModeCli) -> Self {
        match mode {
            ScreeningModeCli::HighSensitivity => ScreeningMode::HighSensitivity,
            ScreeningModeCli::Standard => ScreeningMode::Standard,
        }
    }
}

/// Where the artifacts come from and which screen to apply. Flags win over the
/// configuration file, which wins over built-in defaults.
#[derive(Args)]
pub struct ScreeningArgs {
    /// Optional TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding the model, scaler and feature list artifacts
    #[arg(long, value_name = "DIR")]
    artifacts: Option<PathBuf>,

    /// Classifier and threshold pair to use
    #[arg(long, value_enum)]
    mode: Option<ScreeningModeCli>,

    /// Decision threshold in [0, 1], overriding the mode's default
    #[arg(long, value_parser = parse_threshold)]
    threshold: Option<f64>,
}

#[derive(Args)]
pub struct PredictArgs {
    /// Age in years
    #[arg(long, default_value_t = 61, value_parser = clap::value_parser!(u32).range(*AGE_RANGE.start() as i64..=*AGE_RANGE.end() as i64))]
    age: u32,

    /// Female or Male
    #[arg(long, default_value = "Female")]
    sex: Sex,

    /// Low, Medium or High
    #[arg(long, default_value = "Low")]
    education_level: EducationLevel,

    /// Single or Married
    #[arg(long, default_value = "Single")]
    marital_status: MaritalStatus,

    /// Unemployed or Employed
    #[arg(long, default_value = "Unemployed")]
    labor_status: LaborStatus,

    #[arg(long, default_value = "No")]
    smoking: YesNo,

    #[arg(long, default_value = "No")]
    alcohol_drinking: YesNo,

    #[arg(long, default_value = "No")]
    physical_inactivity: YesNo,

    #[arg(long, default_value = "No")]
    high_salt_intake: YesNo,

    /// Body mass index
    #[arg(long, default_value_t = 30.0, value_parser = parse_bmi)]
    bmi: f64,

    /// Waist circumference in centimetres
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u32).range(*WAIST_RANGE.start() as i64..=*WAIST_RANGE.end() as i64))]
    waist_circumference: u32,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    screening: ScreeningArgs,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Tab-separated file with one patient per row
    #[arg(value_name = "INPUT_TSV")]
    input: PathBuf,

    /// Where to write the predictions
    #[arg(long, default_value = "predictions.tsv")]
    output: PathBuf,

    #[command(flatten)]
    screening: ScreeningArgs,
}

#[derive(Parser)]
#[command(
    name = "riskscreen",
    about = "Diabetes risk screening from health and lifestyle attributes",
    long_about = "Scores patient attributes with persisted classifier and scaler artifacts \
                 and reports a screen-positive or screen-negative decision. \
                 The result is not a medical diagnosis."
)]
struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen a single patient
    #[command(about = "Screen one patient from command-line attributes")]
    Predict(PredictArgs),

    /// Screen every row of a TSV file
    #[command(about = "Screen a TSV of patients (outputs: predictions.tsv)")]
    Batch(BatchArgs),

    /// Describe the loaded artifacts
    #[command(about = "Load the artifacts and print their schema")]
    Inspect(ScreeningArgs),

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

fn main() {
    let Cli { verbose, command } = Cli::parse();

    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match command {
        Some(Commands::Predict(args)) => run_predict(args),
        Some(Commands::Batch(args)) => run_batch(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        Some(Commands::Version) => {
            println!("riskscreen {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    check_threshold(value).map_err(|e| e.to_string())
}

fn parse_bmi(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if BMI_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "BMI must be between {} and {}",
            BMI_RANGE.start(),
            BMI_RANGE.end()
        ))
    }
}

fn load_config(args: &ScreeningArgs) -> Result<ScreenConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ScreenConfig::load(path)?,
        None => ScreenConfig::default(),
    };
    if let Some(dir) = &args.artifacts {
        config.artifacts.dir = dir.clone();
    }
    if let Some(mode) = args.mode {
        config.screening.mode = mode.into();
    }
    if let Some(threshold) = args.threshold {
        config.screening.threshold = Some(threshold);
    }
    config.validate()?;
    Ok(config)
}

fn build_context(args: &ScreeningArgs) -> Result<ScreeningContext, Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    let bundle = ArtifactBundle::load(&config.artifacts)?;
    let context = ScreeningContext::from_config(bundle, &config)?;
    info!(
        "Screening in {} mode at threshold {}",
        context.mode(),
        context.threshold()
    );
    Ok(context)
}

fn run_predict(args: PredictArgs) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = build_context(&args.screening).and_then(|context| {
        let record = PatientRecord::builder()
            .age(args.age)
            .sex(args.sex)
            .education_level(args.education_level)
            .marital_status(args.marital_status)
            .labor_status(args.labor_status)
            .smoking(args.smoking)
            .alcohol_drinking(args.alcohol_drinking)
            .physical_inactivity(args.physical_inactivity)
            .high_salt_intake(args.high_salt_intake)
            .bmi(args.bmi)
            .waist_circumference(args.waist_circumference)
            .build()?;
        Ok(context.predict(&record)?)
    });

    match outcome {
        Ok(screening) => {
            if args.json {
                println!("{}", to_json(&screening)?);
            } else {
                print!("{}", render_screening(&screening));
            }
            Ok(())
        }
        Err(e) => {
            error!("Scoring failed: {e}");
            print!("{}", render_failure());
            Err(e)
        }
    }
}

fn run_batch(args: BatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let context = build_context(&args.screening)?;
    let batch = load_patient_records(&args.input)?;
    let screenings = context.predict_batch(&batch.records)?;
    write_predictions(&args.output, &batch.sample_ids, &screenings)?;

    let positives = screenings
        .iter()
        .filter(|s| s.decision == RiskDecision::ScreenPositive)
        .count();
    println!(
        "Screened {} patients: {} screen-positive, {} screen-negative. Predictions saved to: {}",
        screenings.len(),
        positives,
        screenings.len() - positives,
        args.output.display()
    );
    Ok(())
}

fn run_inspect(args: ScreeningArgs) -> Result<(), Box<dyn std::error::Error>> {
    let context = build_context(&args)?;
    let bundle = context.bundle();
    println!("Features ({}): {}", bundle.features.len(), bundle.features.iter().join(", "));
    println!("Scaler: {}", bundle.scaler.method());
    println!("Default classifier intercept: {}", bundle.default_classifier.intercept);
    println!("Balanced classifier intercept: {}", bundle.balanced_classifier.intercept);
    println!("Mode: {} (threshold {})", context.mode(), context.threshold());
    Ok(())
}
