//! PDF overlay editor command line
//!
//! Inspects PDFs, replays edit scripts against them and keeps the
//! recent-files list.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pdfedit_codec::{export, FixedPath, SaveOptions, SaveOutcome};
use pdfedit_core::{
    EditOperation, EditorConfig, EditorSession, FileInfo, JsonFileStore, RecentFiles,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pdfedit")]
#[command(version, about = "Edit PDF pages, form fields and overlays")]
struct Args {
    /// Editor configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding persisted editor state
    #[arg(long, global = true, default_value = ".pdfedit")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print pages and form fields as JSON
    Info {
        file: PathBuf,
    },
    /// Apply a JSON list of edits and save the result
    Apply {
        file: PathBuf,

        /// Edit script: a JSON array of operations
        #[arg(long)]
        script: PathBuf,

        /// Output file or directory
        #[arg(long)]
        out: PathBuf,

        /// Bake form fields into page content
        #[arg(long)]
        flatten: bool,

        /// Save without drawing overlays
        #[arg(long)]
        no_overlays: bool,
    },
    /// List recently opened files
    Recent {
        /// Forget all recent files
        #[arg(long)]
        clear: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    match path {
        Some(path) => EditorConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EditorConfig::default()),
    }
}

fn recent_files(config: &EditorConfig, state_dir: &Path) -> RecentFiles<JsonFileStore> {
    RecentFiles::load(
        JsonFileStore::new(state_dir),
        config.recent_files_key.clone(),
        config.max_recent_files,
    )
}

fn info(file: &Path) -> Result<()> {
    let doc = pdfedit_codec::open_path(file)
        .with_context(|| format!("opening {}", file.display()))?;

    let summary = serde_json::json!({
        "name": doc.name(),
        "pages": doc.pages(),
        "form_fields": doc.form_fields(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn apply_script(
    config: EditorConfig,
    state_dir: &Path,
    file: &Path,
    script: &Path,
    out: PathBuf,
    options: SaveOptions,
) -> Result<()> {
    let doc = pdfedit_codec::open_path(file)
        .with_context(|| format!("opening {}", file.display()))?;
    let script_json = fs::read_to_string(script)
        .with_context(|| format!("reading script {}", script.display()))?;
    let ops = EditOperation::from_json_list(&script_json)
        .with_context(|| format!("parsing script {}", script.display()))?;

    let opened = FileInfo::for_document(&doc).with_path(file);
    let mut recent = recent_files(&config, state_dir);

    let mut session = EditorSession::new(config);
    session.load(doc);
    session.commit();

    for (n, op) in ops.iter().enumerate() {
        session
            .dispatch(op)
            .with_context(|| format!("edit {} ({})", n + 1, op.name()))?;
        session.commit();
    }

    let Some(doc) = session.document() else {
        bail!("no document loaded");
    };
    tracing::info!(edits = ops.len(), overlays = doc.overlay_count(), "applied script");

    let bytes = pdfedit_codec::save(doc, &options)?;
    let suggested = pdfedit_codec::suggested_name(doc.name());
    match export(&mut FixedPath(out), &suggested, &bytes)? {
        SaveOutcome::Saved(path) => {
            recent.add(opened);
            println!("{}", path.display());
        }
        SaveOutcome::Cancelled => println!("cancelled"),
    }
    Ok(())
}

fn recent(config: &EditorConfig, state_dir: &Path, clear: bool) -> Result<()> {
    let mut recent = recent_files(config, state_dir);
    if clear {
        recent.clear();
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(recent.list())?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so JSON output on stdout stays clean.
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Info { file } => info(&file),
        Command::Apply {
            file,
            script,
            out,
            flatten,
            no_overlays,
        } => {
            let options = SaveOptions {
                flatten_forms: flatten,
                include_overlays: !no_overlays,
            };
            apply_script(config, &args.state_dir, &file, &script, out, options)
        }
        Command::Recent { clear } => recent(&config, &args.state_dir, clear),
    }
}
