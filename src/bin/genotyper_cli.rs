use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use genotyper_rs::blastdb::{MakeBlastDb, DEFAULT_DB_NAME};
use genotyper_rs::classifier::GenoFluCommand;
use genotyper_rs::columns::ColumnPolicy;
use genotyper_rs::{Pipeline, PipelineConfig};

#[derive(Parser, Debug, Clone)]
#[clap(
    author,
    version,
    about = "Genotype every new complete 8-segment assembly in a directory",
    long_about = "Groups the records of every *.fasta in FASTA_DIR by identifier, \
skips strains already in FASTA_DIR/results/results.tsv, rebuilds the BLAST \
database from REFERENCE_DIR and runs the genotype caller once per new strain, \
appending one row per strain to results.tsv."
)]
struct Args {
    /// Directory of assembled FASTA files
    #[arg(short = 'f', long = "fasta_dir", required = true)]
    fasta_dir: PathBuf,

    /// Directory of reference FASTAs to BLAST against. Headers must follow
    /// the genotype caller's naming convention.
    /// [default: <install>/dependencies/fastas]
    #[arg(short = 'r', long = "reference_dir")]
    reference_dir: Option<PathBuf>,

    /// Excel genotype key: first column Genotype, then one column per segment.
    /// [default: <install>/dependencies/genotype_key.xlsx]
    #[arg(short = 'c', long = "cross_reference")]
    cross_reference: Option<PathBuf>,

    /// Genotype caller executable
    #[arg(long, default_value = "genoflu.py")]
    classifier: PathBuf,

    /// Extra argument placed before the standard ones (repeatable), e.g. the
    /// script path when --classifier is an interpreter
    #[arg(long = "classifier-arg", allow_hyphen_values = true)]
    classifier_args: Vec<String>,

    /// makeblastdb executable
    #[arg(long, default_value = "makeblastdb")]
    makeblastdb: PathBuf,

    /// Name and title of the rebuilt database
    #[arg(long = "db-name", default_value = DEFAULT_DB_NAME)]
    db_name: String,

    /// Seconds to wait for each external tool before killing it (0 = no limit)
    #[arg(long, default_value_t = 3600)]
    timeout: u64,

    /// Fail when the caller's output lacks an expected column instead of
    /// keeping its native column order
    #[arg(long = "strict-columns")]
    strict_columns: bool,
}

/// `dependencies/` beside the install: `<exe_dir>/../dependencies`, as in a
/// `bin/` + `dependencies/` checkout. Falls back to `./dependencies`.
fn dependencies_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|bin| bin.join("..").join("dependencies")))
        .unwrap_or_else(|| PathBuf::from("dependencies"))
}

impl Args {
    fn timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    fn reference_dir(&self) -> PathBuf {
        self.reference_dir
            .clone()
            .unwrap_or_else(|| dependencies_dir().join("fastas"))
    }

    fn cross_reference(&self) -> PathBuf {
        self.cross_reference
            .clone()
            .unwrap_or_else(|| dependencies_dir().join("genotype_key.xlsx"))
    }
}

fn spinner(color: &str, msg: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template(&format!("{{spinner:.{color}}} {{msg}}"))
            .expect("Invalid spinner template"),
    );
    spinner.set_message(msg);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

impl From<&Args> for PipelineConfig {
    fn from(item: &Args) -> Self {
        let mut config = PipelineConfig::new(
            &item.fasta_dir,
            item.reference_dir(),
            item.cross_reference(),
        );
        config.db_name = item.db_name.clone();
        config.column_policy = if item.strict_columns {
            ColumnPolicy::Strict
        } else {
            ColumnPolicy::Lenient
        };
        config
    }
}

impl From<&Args> for GenoFluCommand {
    fn from(item: &Args) -> Self {
        Self {
            program: item.classifier.clone(),
            leading_args: item.classifier_args.clone(),
            reference_dir: item.reference_dir(),
            cross_reference: item.cross_reference(),
            timeout: item.timeout(),
        }
    }
}

impl From<&Args> for MakeBlastDb {
    fn from(item: &Args) -> Self {
        Self {
            program: item.makeblastdb.clone(),
            timeout: item.timeout(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let start = Instant::now();

    let config = PipelineConfig::from(&args);
    let builder = MakeBlastDb::from(&args);
    let classifier = GenoFluCommand::from(&args);

    // 1. Gather assemblies and group them by strain
    let spinner_1 = spinner("blue", "Gathering assembly FASTA files...");
    let mut pipeline = Pipeline::prepare(&config)?;
    let strains = pipeline.discover()?;
    spinner_1.finish_with_message(format!("Found {} strain(s).", strains));

    // 2. Rebuild the reference database
    let spinner_2 = spinner("yellow", "Building reference database...");
    let database = pipeline.build_database(&builder)?;
    spinner_2.finish_with_message("Reference database built.");

    // 3. Classify new samples
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.green} [{pos}/{len}] {msg}")?,
    );
    progress.enable_steady_tick(Duration::from_millis(120));
    let summary = pipeline.classify(&database, &classifier, &progress)?;
    progress.finish_and_clear();

    // 4. Clean up staging and the database
    pipeline.finish(database)?;
    log::info!(
        "Classified {} strain(s) into {:?} in {:?} ({} incomplete, {} already annotated)",
        summary.classified.len(),
        summary.results_file,
        start.elapsed(),
        summary.incomplete,
        summary.already_annotated
    );
    Ok(())
}
