use anyhow::Context;
use clap::{Parser, Subcommand};
use pfs_core::constants::{
    INDEX_PATH_ENV, MAX_ARCHIVE_ENTRIES_ENV, MAX_EXTRACTED_BYTES_ENV, STORAGE_ROOT_ENV,
};
use pfs_core::{
    extraction_limits_from_env_values, optional_path_from_env_value, storage_root_from_env_value,
    CoreConfig, FileService, IngestBatch, SqliteIndex, StoredFile, Upload,
};
use pfs_types::{EntityId, FileId, Modality, ReportFormat};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pfs")]
#[command(about = "Patient file store: ingest, resolve and manage stored patient files")]
struct Cli {
    /// Storage root (overrides PFS_STORAGE_ROOT)
    #[arg(long, global = true)]
    storage_root: Option<PathBuf>,

    /// Metadata index file (overrides PFS_INDEX_PATH)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Print rows and reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest uploads and deletions for one entity in a single batch
    Ingest {
        entity: EntityId,
        /// Upload a file or ZIP archive, as MODALITY=PATH
        #[arg(long = "upload", value_parser = parse_upload)]
        uploads: Vec<(Modality, PathBuf)>,
        /// Delete a stored file first, as MODALITY=ID
        #[arg(long = "delete", value_parser = parse_delete)]
        deletes: Vec<(Modality, FileId)>,
    },
    /// List stored files of an entity
    List {
        entity: EntityId,
        #[arg(long)]
        modality: Option<Modality>,
    },
    /// Print the physical path of a stored file
    Resolve { modality: Modality, id: FileId },
    /// Delete stored files of one entity and modality
    Delete {
        entity: EntityId,
        modality: Modality,
        #[arg(required = true)]
        ids: Vec<FileId>,
    },
    /// Delete every stored file of an entity
    Purge { entity: EntityId },
    /// Re-hash a stored file and compare against its recorded digests
    Verify { modality: Modality, id: FileId },
    /// Store a generated report, replacing the previous one of the same format
    Export {
        entity: EntityId,
        format: ReportFormat,
        path: PathBuf,
        /// Display name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
    },
    /// List the modalities that hold files for an entity
    Modalities { entity: EntityId },
}

fn parse_pair(value: &str) -> Result<(Modality, &str), String> {
    let (modality, rest) = value
        .split_once('=')
        .ok_or_else(|| format!("expected MODALITY=VALUE, got '{value}'"))?;
    let modality = modality.parse::<Modality>().map_err(|e| e.to_string())?;
    Ok((modality, rest))
}

fn parse_upload(value: &str) -> Result<(Modality, PathBuf), String> {
    let (modality, path) = parse_pair(value)?;
    Ok((modality, PathBuf::from(path)))
}

fn parse_delete(value: &str) -> Result<(Modality, FileId), String> {
    let (modality, id) = parse_pair(value)?;
    let id = id.parse::<FileId>().map_err(|e| e.to_string())?;
    Ok((modality, id))
}

fn print_row(row: &StoredFile) {
    println!(
        "{}  {}  {}  {}  {} bytes  {}",
        row.id,
        row.modality,
        row.canonical_name,
        row.display_name,
        row.size_bytes,
        row.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}

/// Resolves configuration from the environment, with command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<CoreConfig> {
    let storage_root = cli
        .storage_root
        .clone()
        .unwrap_or_else(|| storage_root_from_env_value(std::env::var(STORAGE_ROOT_ENV).ok()));
    let index_path = cli
        .index
        .clone()
        .or_else(|| optional_path_from_env_value(std::env::var(INDEX_PATH_ENV).ok()));
    let limits = extraction_limits_from_env_values(
        std::env::var(MAX_ARCHIVE_ENTRIES_ENV).ok(),
        std::env::var(MAX_EXTRACTED_BYTES_ENV).ok(),
    )?;

    Ok(CoreConfig::new(storage_root, index_path, limits)?)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("pfs=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = Arc::new(load_config(&cli)?);
    tracing::debug!(
        storage_root = %cfg.storage_root().display(),
        index = %cfg.index_path().display(),
        "resolved configuration"
    );

    let index = SqliteIndex::open(cfg.index_path())
        .with_context(|| format!("opening index {}", cfg.index_path().display()))?;
    let service = FileService::new(cfg, index)?;
    let json = cli.json;

    match cli.command {
        Commands::Ingest {
            entity,
            uploads,
            deletes,
        } => {
            let mut batch = IngestBatch::new();
            for (modality, id) in deletes {
                batch = batch.with_delete(modality, id);
            }
            for (modality, path) in uploads {
                batch = batch.with_upload(modality, Upload::from_path(path));
            }

            let report = service.ingest(entity, batch);
            for id in report.deleted() {
                println!("deleted {id}");
            }
            for row in report.stored() {
                print_row(row);
            }

            let mut failed = 0;
            for bucket in &report.buckets {
                for (id, e) in &bucket.delete_failures {
                    eprintln!("delete {} in {}: {}", id, bucket.bucket, e);
                    failed += 1;
                }
            }
            for (name, e) in report.failures() {
                eprintln!("upload {name}: {e}");
                failed += 1;
            }
            if failed > 0 {
                anyhow::bail!("{failed} item(s) failed");
            }
        }
        Commands::List { entity, modality } => {
            let rows = match modality {
                Some(modality) => service.list(entity, modality)?,
                None => service.list_entity(entity)?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No files found.");
            } else {
                for row in &rows {
                    print_row(row);
                }
            }
        }
        Commands::Resolve { modality, id } => {
            let resolved = service.resolve_path(modality, id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&resolved)?);
            } else {
                println!("{}", resolved.path.display());
            }
            if !resolved.exists() {
                anyhow::bail!(
                    "{} is recorded but missing on disk",
                    resolved.download_name()
                );
            }
        }
        Commands::Delete {
            entity,
            modality,
            ids,
        } => {
            let deleted = service.delete(entity, modality, &ids)?;
            for id in &deleted {
                println!("deleted {id}");
            }
            for id in ids.iter().filter(|id| !deleted.contains(id)) {
                eprintln!("no {modality} file {id} for entity {entity}");
            }
        }
        Commands::Purge { entity } => {
            let removed = service.purge_entity(entity)?;
            println!("Removed {removed} file(s) for entity {entity}");
        }
        Commands::Verify { modality, id } => {
            let report = service.verify(modality, id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}  sha256 {}", report.path.display(), report.actual.sha256);
            }
            report.into_result()?;
        }
        Commands::Export {
            entity,
            format,
            path,
            name,
        } => {
            let name = match name {
                Some(name) => name,
                None => path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .context("export path has no file name")?,
            };
            let file =
                File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            let row = service.replace_report_export(entity, format, &name, file)?;
            print_row(&row);
        }
        Commands::Modalities { entity } => {
            for modality in service.modalities_with_files(entity)? {
                println!("{modality}");
            }
        }
    }

    Ok(())
}
