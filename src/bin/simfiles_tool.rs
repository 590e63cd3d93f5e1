use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use simfiles::{IdPolicy, RunConfig};
use simfiles::storage::naming::{
    CYLINDER_DIR, DEFAULT_HEADER_TAG, RUN_ID_WIDTH, first_free_id, scan_run_files, taken_ids_in,
};
use simfiles::{FileKind, RunFileName};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "simfiles-tool")]
#[command(about = "Inspect simulation output directories")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the runs found in an output directory
    List {
        dir: PathBuf,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Print the run id a new run with this seed would get
    NextId {
        dir: PathBuf,
        #[arg(long)]
        seed: u64,
        #[arg(long, default_value = DEFAULT_HEADER_TAG)]
        tag: String,
        #[arg(long)]
        timestamped: bool,
        #[arg(long, default_value_t = 1000)]
        max_attempts: u32,
    },
    /// Print the output paths of a run described by a JSON config
    Paths {
        config: PathBuf,
        /// Run id to use instead of the config's resume id or seed
        #[arg(long)]
        id: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::List { dir, tag } => list_runs(&dir, tag.as_deref()),
        Command::NextId {
            dir,
            seed,
            tag,
            timestamped,
            max_attempts,
        } => {
            let policy = if timestamped {
                IdPolicy::Timestamped
            } else {
                IdPolicy::Seeded
            };
            let taken = taken_ids_in(&dir, &tag)
                .with_context(|| format!("Failed to scan '{}'", dir.display()))?;
            let run_id = first_free_id(&taken, policy.candidate(seed), max_attempts)?;
            println!("{:0width$}", run_id, width = RUN_ID_WIDTH);
            Ok(())
        }
        Command::Paths { config, id } => print_paths(&config, id),
    }
}

fn print_paths(config_path: &Path, id: Option<u64>) -> Result<()> {
    let config = RunConfig::from_json_file(config_path)
        .with_context(|| format!("Failed to load '{}'", config_path.display()))?;
    let naming = config.naming()?;
    let run_id = id.or(config.resume_id).unwrap_or(config.seed);

    for kind in FileKind::ALL.iter().filter(|kind| !kind.is_input()) {
        println!("{:<14} {}", kind.as_str(), naming.path_for(*kind, run_id).display());
    }
    Ok(())
}

#[derive(Default)]
struct RunSummary {
    header_tag: String,
    labels: Vec<String>,
    kinds: Vec<FileKind>,
}

fn list_runs(dir: &Path, tag: Option<&str>) -> Result<()> {
    if !dir.is_dir() {
        bail!("'{}' is not a directory", dir.display());
    }

    let mut files: Vec<RunFileName> = Vec::new();
    for scan_dir in [dir.to_path_buf(), dir.join(CYLINDER_DIR)] {
        let found = scan_run_files(&scan_dir)
            .with_context(|| format!("Failed to scan '{}'", scan_dir.display()))?;
        files.extend(found);
    }

    let mut runs: BTreeMap<u64, RunSummary> = BTreeMap::new();
    for file in files {
        if tag.is_some_and(|tag| tag != file.header_tag) {
            continue;
        }
        let summary = runs.entry(file.run_id).or_default();
        summary.header_tag = file.header_tag;
        let label = format!("{}-{}", file.ensemble, file.data_label);
        if !summary.labels.contains(&label) {
            summary.labels.push(label);
        }
        summary.kinds.push(file.kind);
    }

    if runs.is_empty() {
        println!("No runs found in {}", dir.display());
        return Ok(());
    }

    for (run_id, mut summary) in runs {
        summary.kinds.sort();
        summary.kinds.dedup();
        let kinds = summary
            .kinds
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:0width$}  {}  {}  [{}]",
            run_id,
            summary.header_tag,
            summary.labels.join(" "),
            kinds,
            width = RUN_ID_WIDTH
        );
    }
    Ok(())
}
