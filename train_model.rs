use clap::{Arg, Command};
use log::LevelFilter;
use phishing_detector::config::DEFAULT_CONFIG_PATH;
use phishing_detector::corpus::FileStatus;
use phishing_detector::{DetectorConfig, DirectorySource, TrainingPipeline, TrainingSummary};
use std::process;

fn main() -> anyhow::Result<()> {
    let matches = Command::new("train-model")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Train the TF-IDF + Naive Bayes phishing classifier")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("from-cleaned")
                .long("from-cleaned")
                .help("Train from the cleaned CSV directory instead of the raw data directory")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return Ok(());
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);
    let config = DetectorConfig::load_or_default(config_path)?;

    let data_dir = if matches.get_flag("from-cleaned") {
        &config.cleaned_dir
    } else {
        &config.data_dir
    };
    log::info!("Loading training data from '{}'", data_dir.display());

    let pipeline = TrainingPipeline::from_config(&config)?;
    let trained = pipeline.train_and_save(&DirectorySource::new(data_dir), &config.model_dir)?;

    print_summary(&trained.summary);
    println!("Model and vectorizer saved to '{}'", config.model_dir.display());
    Ok(())
}

fn print_summary(summary: &TrainingSummary) {
    for file in &summary.build.files {
        match &file.status {
            FileStatus::Loaded {
                kept,
                dropped_label,
                dropped_body,
                malformed,
                ..
            } => println!(
                "Loaded: {} (rows: {kept}, dropped: {})",
                file.source,
                dropped_label + dropped_body + malformed
            ),
            FileStatus::Skipped { reason } => println!("Skipped: {} ({reason})", file.source),
        }
    }
    println!();
    println!(
        "Corpus: {} emails ({} phishing, {} safe), vocabulary of {} terms",
        summary.corpus_size, summary.phishing_count, summary.safe_count, summary.vocabulary_size
    );
    println!("Split: {} training, {} test", summary.train_size, summary.test_size);
    println!();
    println!("Classification Report:");
    println!("{}", summary.evaluation);
    println!("Accuracy: {:.4}", summary.evaluation.accuracy);
}

fn generate_default_config(path: &str) {
    let config = DetectorConfig::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
