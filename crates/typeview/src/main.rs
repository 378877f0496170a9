use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use itertools::Itertools;
use mimalloc::MiMalloc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use typeview_design::{
    DataType, Design, MediaTypeId, MissingFields, Object, ProjectOptions,
    TypeGraph, collect_user_types, declaration_order, export_projection,
    load_design, project_with, write_json,
};
use typeview_schemas::DesignDocument;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Inspect declarative type designs and render media types through views.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project a media type through one of its views
    ///
    /// Writes a JSON document holding the projected media type, its links
    /// type and every named type they refer to.
    Project {
        /// Path to the design document
        design: PathBuf,

        /// Identifier or type name of the media type to project
        #[arg(short, long)]
        media_type: String,

        /// View to render
        #[arg(long, default_value = "default")]
        view: String,

        /// Drop view fields the media type does not declare instead of
        /// failing
        #[arg(long)]
        skip_missing_fields: bool,

        /// Output file path (writes to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List named types in declaration order
    ///
    /// Prints one line per declaration group, dependencies first. Mutually
    /// recursive types share a line.
    Types {
        /// Path to the design document
        design: PathBuf,

        /// Only list types reachable from this media type
        #[arg(short, long)]
        media_type: Option<String>,
    },

    /// List the views of a media type in sorted order
    Views {
        /// Path to the design document
        design: PathBuf,

        /// Identifier or type name of the media type
        #[arg(short, long)]
        media_type: String,
    },

    /// Print the JSON Schema of design documents
    Schema,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output on stdout stays clean for piping.
    const CRATES: &[&str] = &["typeview", "typeview_design", "typeview_schemas"];
    let level = cli.verbose.tracing_level_filter();
    let allowlist = CRATES.iter().map(|c| format!("{c}={level}")).join(",");
    let filter = EnvFilter::new(format!("warn,{allowlist}"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE)
        .init();

    // Stdout must outlive the lock, so we bind it here first.
    let stdout = std::io::stdout();
    match cli.command {
        Commands::Project {
            design,
            media_type,
            view,
            skip_missing_fields,
            output,
        } => {
            let mut writer: Box<dyn Write> = match output {
                Some(path) => Box::new(BufWriter::new(File::create(path)?)),
                None => Box::new(stdout.lock()),
            };
            let options = ProjectOptions {
                missing_fields: if skip_missing_fields {
                    MissingFields::Skip
                } else {
                    MissingFields::Error
                },
            };
            run_project(&design, &media_type, &view, &options, &mut *writer)?;
            writer.flush()?;
        }
        Commands::Types { design, media_type } => {
            run_types(&design, media_type.as_deref(), &mut stdout.lock())?;
        }
        Commands::Views { design, media_type } => {
            run_views(&design, &media_type, &mut stdout.lock())?;
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(DesignDocument);
            write_json(stdout.lock(), &schema)?;
        }
    }
    Ok(())
}

fn open_design(path: &Path) -> Result<Design> {
    let file = File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let design = load_design(BufReader::new(file))
        .with_context(|| format!("failed to load {}", path.display()))?;
    info!(
        user_types = design.user_type_count(),
        media_types = design.media_type_count(),
        path = %path.display(),
        "loaded design"
    );
    Ok(design)
}

fn find_media_type(design: &Design, name: &str) -> Result<MediaTypeId> {
    design
        .media_type_with_identifier(name)
        .ok_or_else(|| {
            anyhow!("no media type with identifier or name {name:?}")
        })
}

fn run_project(
    path: &Path,
    media_type: &str,
    view: &str,
    options: &ProjectOptions,
    output: &mut dyn Write,
) -> Result<()> {
    let design = open_design(path)?;
    let id = find_media_type(&design, media_type)?;
    let projection = project_with(&design, id, view, options)?;
    info!(
        media_types = projection.projected_media_types().count(),
        "projected {media_type} through view {view:?}"
    );
    write_json(output, &export_projection(&projection))?;
    Ok(())
}

fn run_types(
    path: &Path,
    media_type: Option<&str>,
    output: &mut dyn Write,
) -> Result<()> {
    let design = open_design(path)?;

    let mut roots = Object::new();
    match media_type {
        Some(name) => {
            let id = find_media_type(&design, name)?;
            roots.insert(name.to_owned(), DataType::Media(id).into());
        }
        None => {
            design.iterate_media_types(|id, mt| {
                roots.insert(mt.identifier.clone(), DataType::Media(id).into());
                Ok::<_, anyhow::Error>(())
            })?;
        }
    }

    let types = collect_user_types(&design, &roots);
    for group in declaration_order(&design, &types) {
        let names = group.iter().map(|id| &design.named_type(*id).name);
        writeln!(output, "{}", names.format(", "))?;
    }
    Ok(())
}

fn run_views(
    path: &Path,
    media_type: &str,
    output: &mut dyn Write,
) -> Result<()> {
    let design = open_design(path)?;
    let id = find_media_type(&design, media_type)?;
    design
        .media_type(id)
        .iterate_views(|view| writeln!(output, "{}", view.name))?;
    Ok(())
}
