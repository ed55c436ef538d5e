use clap::{Arg, Command};
use log::LevelFilter;
use phishing_detector::config::DEFAULT_CONFIG_PATH;
use phishing_detector::corpus::{cleaned_file_name, write_cleaned_csv, FileStatus};
use phishing_detector::schema::SchemaMapper;
use phishing_detector::{
    CorpusBuilder, DetectorConfig, DirectorySource, StopwordSet, TextNormalizer,
};
use std::fs::{self, File};
use std::io::BufWriter;

fn main() -> anyhow::Result<()> {
    let matches = Command::new("clean-data")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Normalize labeled email CSV files into *_cleaned.csv files")
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
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);
    let config = DetectorConfig::load_or_default(config_path)?;
    config.validate()?;

    let stopwords = StopwordSet::resolve(config.stopwords_file.as_deref())?;
    let mapper = SchemaMapper::new(&config.corpus.body_aliases, &config.corpus.label_aliases);
    let builder =
        CorpusBuilder::new(mapper, TextNormalizer::new(stopwords)).parallel(config.corpus.parallel);

    let source = DirectorySource::new(&config.data_dir);
    let outcomes = builder.process_all(&source)?;
    fs::create_dir_all(&config.cleaned_dir)?;

    let mut written = 0;
    for outcome in &outcomes {
        match &outcome.report.status {
            FileStatus::Loaded { kept, .. } => {
                let target = config
                    .cleaned_dir
                    .join(cleaned_file_name(&outcome.report.source));
                write_cleaned_csv(&outcome.records, BufWriter::new(File::create(&target)?))?;
                println!(
                    "Processed: {} -> {} ({kept} rows)",
                    outcome.report.source,
                    target.display()
                );
                written += 1;
            }
            FileStatus::Skipped { reason } => {
                println!("Skipped: {} ({reason})", outcome.report.source);
            }
        }
    }

    println!(
        "Cleaned {written} of {} files into '{}'",
        outcomes.len(),
        config.cleaned_dir.display()
    );
    Ok(())
}
