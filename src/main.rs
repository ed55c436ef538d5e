use clap::{Arg, Command};
use log::LevelFilter;
use phishing_detector::config::DEFAULT_CONFIG_PATH;
use phishing_detector::inference::ensure_input_file;
use phishing_detector::{DetectorConfig, Label, PhishingDetector, StopwordSet, TextNormalizer};
use std::process;

fn main() {
    let matches = Command::new("phishing-detector")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Classify an email body as phishing or safe")
        .arg(
            Arg::new("email")
                .value_name("EMAIL_FILE")
                .help("Path to a text file holding the email body")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
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
        LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);
    let email_file = matches
        .get_one::<String>("email")
        .map(String::as_str)
        .unwrap_or_default();

    let config = match DetectorConfig::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    // input errors take precedence over a missing model
    if let Err(e) = ensure_input_file(email_file) {
        eprintln!("Error: {e}");
        process::exit(2);
    }

    let detector = match load_detector(&config) {
        Ok(detector) => detector,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Run train-model first to create the model files.");
            process::exit(1);
        }
    };

    match detector.classify_file(email_file) {
        Ok(result) => {
            println!(
                "The email is classified as: {}",
                result.predicted_label.as_str().to_uppercase()
            );
            println!(
                "Confidence - Phishing: {:.2}, Safe: {:.2}",
                result.confidence_for(Label::Phishing),
                result.confidence_for(Label::Safe)
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(if e.is_user_input() { 2 } else { 1 });
        }
    }
}

fn load_detector(config: &DetectorConfig) -> anyhow::Result<PhishingDetector> {
    let detector = match config.stopwords_file.as_deref() {
        Some(path) => {
            let stopwords = StopwordSet::resolve(Some(path))?;
            let normalizer = TextNormalizer::new(stopwords);
            PhishingDetector::load_with_normalizer(&config.model_dir, normalizer)?
        }
        None => PhishingDetector::load(&config.model_dir)?,
    };
    log::debug!(
        "Loaded model from '{}' ({} terms)",
        config.model_dir.display(),
        detector.vocabulary_size()
    );
    Ok(detector)
}
