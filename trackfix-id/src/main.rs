//! trackfix - fingerprint, tag and rename audio files
//!
//! Loads policies from the config file (CLI flags override), wires the
//! default collaborators (lofty, fpcalc + AcoustID, MusicBrainz) into the
//! pipeline and runs it over the given files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use trackfix_common::config::{load_config, resolve_config_path, TomlConfig};
use trackfix_id::config::{jobs_from_config, policies_from_config, resolve_acoustid_api_key};
use trackfix_id::services::{
    passthrough_updates, AcoustIdProvider, FileScanner, Identifier, LoftyCodec,
    MusicBrainzClient, MusicBrainzProvider, Renamer, TagInspector,
};
use trackfix_id::types::template_values;
use trackfix_id::{
    process_batch, BatchReport, Candidate, CandidateProvider, IdentifyError, Pipeline,
    ProcessOptions, TagSnapshot,
};

#[derive(Parser, Debug)]
#[clap(name = "trackfix", version)]
#[clap(about = "Identify audio files by fingerprint, fix their tags and rename them")]
struct Cli {
    /// Config file (default: $TRACKFIX_CONFIG, then <config dir>/trackfix/config.toml)
    #[clap(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (overrides the config file)
    #[clap(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline over files and directories
    Process(ProcessArgs),

    /// Print ranked candidates for one file
    Identify {
        path: PathBuf,
        #[clap(long)]
        json: bool,
    },

    /// Print a file's current tags
    Tags {
        path: PathBuf,
        #[clap(long)]
        json: bool,
    },

    /// Rename a file from its own tags
    Rename {
        path: PathBuf,
        #[clap(long)]
        template: String,
        /// Rename even when title or artist is missing
        #[clap(long)]
        allow_missing_fields: bool,
        /// Print the proposed name without renaming
        #[clap(long)]
        dry_run: bool,
    },
}

#[derive(clap::Args, Debug)]
struct ProcessArgs {
    #[clap(required = true)]
    paths: Vec<PathBuf>,

    /// Descend into directories
    #[clap(long, short = 'r')]
    recursive: bool,

    /// Skip identification and go straight to the fallback branch
    #[clap(long)]
    no_identify: bool,

    /// Never write tags
    #[clap(long)]
    no_tag: bool,

    #[clap(long, value_name = "SCORE")]
    min_confidence: Option<f64>,

    #[clap(long, value_name = "N")]
    max_candidates: Option<usize>,

    /// What to do with tags when there is no confident match
    #[clap(long, value_name = "MODE", value_parser = ["passthrough", "skip"])]
    on_identify_fail: Option<String>,

    /// Disable the VirtualDJ compatibility transform
    #[clap(long)]
    no_vdj_compat: bool,

    #[clap(long)]
    no_rename: bool,

    /// Rename template, e.g. "{artist} - {title}"
    #[clap(long)]
    template: Option<String>,

    /// Rename even when title or artist is missing
    #[clap(long)]
    allow_missing_fields: bool,

    /// Files processed concurrently
    #[clap(long, short = 'j')]
    jobs: Option<usize>,

    /// Print the batch report as JSON
    #[clap(long)]
    json: bool,
}

impl ProcessArgs {
    /// Fold flags into the file config so one validation path covers both
    fn apply_to(&self, config: &mut TomlConfig) {
        if let Some(v) = self.min_confidence {
            config.identification.min_confidence = Some(v);
        }
        if let Some(v) = self.max_candidates {
            config.identification.max_candidates = Some(v);
        }
        if let Some(v) = &self.on_identify_fail {
            config.tags.on_identify_fail = Some(v.clone());
        }
        if self.no_vdj_compat {
            config.tags.ensure_virtualdj_compat = Some(false);
        }
        if self.no_rename {
            config.rename.enabled = Some(false);
        }
        if let Some(v) = &self.template {
            config.rename.template = Some(v.clone());
        }
        if self.allow_missing_fields {
            config.rename.require_title_and_artist = Some(false);
        }
        if let Some(v) = self.jobs {
            config.jobs = Some(v);
        }
    }

    fn options(&self) -> ProcessOptions {
        ProcessOptions {
            do_identify: !self.no_identify,
            do_tag: !self.no_tag,
        }
    }
}

/// Stands in for AcoustID when identification is switched off
struct UnconfiguredProvider;

#[async_trait::async_trait]
impl CandidateProvider for UnconfiguredProvider {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    async fn lookup(
        &self,
        _path: &Path,
        _snapshot: Option<&TagSnapshot>,
    ) -> Result<Vec<Candidate>, IdentifyError> {
        Err(IdentifyError::Provider(
            "identification is not configured".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = load_config(cli.config.as_deref())?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    trackfix_common::logging::init_tracing(&level)?;

    match &config_path {
        Some(path) if path.exists() => info!(config = %path.display(), "Loaded configuration"),
        Some(path) => warn!(config = %path.display(), "Config file not found, using defaults"),
        None => warn!("No config directory available, using defaults"),
    }

    match cli.command {
        Command::Process(args) => {
            args.apply_to(&mut config);
            run_process(&args, &config).await
        }
        Command::Identify { path, json } => run_identify(&path, json, &config).await,
        Command::Tags { path, json } => run_tags(&path, json),
        Command::Rename {
            path,
            template,
            allow_missing_fields,
            dry_run,
        } => run_rename(&path, &template, allow_missing_fields, dry_run),
    }
}

fn candidate_provider(config: &TomlConfig) -> Result<Arc<dyn CandidateProvider>> {
    let api_key = resolve_acoustid_api_key(config)?;
    let provider = AcoustIdProvider::from_api_key(api_key)
        .context("Failed to create AcoustID client")?;
    Ok(Arc::new(provider))
}

async fn run_process(args: &ProcessArgs, config: &TomlConfig) -> Result<ExitCode> {
    let policies = policies_from_config(config)?;
    let options = args.options();

    let candidates: Arc<dyn CandidateProvider> = if options.do_identify {
        candidate_provider(config)?
    } else {
        Arc::new(UnconfiguredProvider)
    };
    let mb_client = MusicBrainzClient::new(config.musicbrainz_contact.as_deref())
        .context("Failed to create MusicBrainz client")?;

    let pipeline = Pipeline::new(
        Arc::new(LoftyCodec::new()),
        candidates,
        Arc::new(MusicBrainzProvider::new(mb_client)),
        policies,
    );

    let files = FileScanner::new().expand(&args.paths, args.recursive)?;
    if files.is_empty() {
        warn!("No audio files to process");
    }

    let report = process_batch(&pipeline, &files, options, jobs_from_config(config)).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_report(report: &BatchReport) {
    for outcome in &report.files {
        match (&outcome.result, &outcome.error) {
            (Some(result), _) => {
                let confidence = result
                    .confidence
                    .map(|c| format!(" ({:.2})", c))
                    .unwrap_or_default();
                println!(
                    "{}: {}{} -> {}{}{}",
                    outcome.path.display(),
                    result.reason,
                    confidence,
                    result.final_filename,
                    if result.wrote_tags { " [tagged]" } else { "" },
                    if result.renamed { " [renamed]" } else { "" },
                );
                for w in &result.warnings {
                    println!("    warning {}: {}", w.code, w.message);
                }
            }
            (None, Some(error)) => println!("{}: error: {}", outcome.path.display(), error),
            (None, None) => {}
        }
    }
    println!("\n{}", report.stats.display_string());
}

async fn run_identify(path: &Path, json: bool, config: &TomlConfig) -> Result<ExitCode> {
    let policies = policies_from_config(config)?;
    let tags = TagInspector::new(Arc::new(LoftyCodec::new()));
    let snapshot = tags.read(path)?;

    let identifier = Identifier::new(candidate_provider(config)?, policies.identification);
    let candidates = identifier.candidates(path, Some(&snapshot)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
    } else if candidates.is_empty() {
        println!("No candidates");
    } else {
        for c in &candidates {
            let confident = if identifier.policy().is_confident(c.confidence) {
                "*"
            } else {
                " "
            };
            println!("{} {:.3}  {}", confident, c.confidence, c.recording_id);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_tags(path: &Path, json: bool) -> Result<ExitCode> {
    let tags = TagInspector::new(Arc::new(LoftyCodec::new()));
    let dump = tags.dump(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&dump)?);
    } else {
        for (field, value) in &dump {
            println!("{:>14}: {}", field, value);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_rename(
    path: &Path,
    template: &str,
    allow_missing_fields: bool,
    dry_run: bool,
) -> Result<ExitCode> {
    let policy = trackfix_id::RenamePolicy::new(true, template, !allow_missing_fields)?;
    let tags = TagInspector::new(Arc::new(LoftyCodec::new()));
    let snapshot = tags.read(path)?;
    let values = template_values(&passthrough_updates(&snapshot));

    if !policy.allows(values.contains_key("title"), values.contains_key("artist")) {
        println!("{}: title or artist missing, not renamed", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let renamer = Renamer::new();
    let proposal = renamer.propose(path, &values, policy.template_str())?;
    if dry_run {
        println!("{} -> {}", path.display(), proposal.dest_name);
        return Ok(ExitCode::SUCCESS);
    }

    let new_path = renamer.apply(&proposal)?;
    println!("{} -> {}", path.display(), new_path.display());
    Ok(ExitCode::SUCCESS)
}
