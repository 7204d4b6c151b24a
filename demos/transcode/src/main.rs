use anyhow::{bail, Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tessera::mesh::Mesh;
use tessera::registry::{self, WriteOptions};
use tessera::stream::Compression;

/// Reads a mesh and optionally writes it to another file.
#[derive(Debug, Parser)]
#[command(name = "transcode")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Transcode meshes between supported encodings", long_about = None)]
struct Cli {
    /// Mesh to read.
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Destination of the mesh. The encoding is chosen by extension.
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Compress the output with gzip.
    #[arg(short, long)]
    compression: bool,

    /// Gzip compression level.
    #[arg(long, value_name = "0-9", value_parser = clap::value_parser!(u32).range(0..=9))]
    level: Option<u32>,

    /// Print mesh statistics.
    #[arg(long)]
    info: bool,

    /// Log debug messages.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn compression(&self) -> Compression {
        match (self.compression, self.level) {
            (_, Some(level)) => Compression::Gzip(level),
            (true, None) => Compression::gzip(),
            (false, None) => Compression::None,
        }
    }
}

fn print_info(mesh: &Mesh) {
    println!("points:     {}", mesh.point_count());
    println!("cells:      {}", mesh.cell_count());
    let mut kinds = BTreeMap::new();
    for cell in mesh.cells() {
        *kinds.entry(format!("{:?}", cell.kind())).or_insert(0usize) += 1;
    }
    for (kind, count) in kinds {
        println!("  {:<14}{}", kind, count);
    }
    for attribute in mesh.attributes() {
        println!(
            "attribute:  {} ({:?}, {:?}, {})",
            attribute.name(),
            attribute.association(),
            attribute.data().component_type(),
            attribute.len(),
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let registry = registry::registry();
    log::debug!("registered extensions: {:?}", registry.extensions());

    let mesh = registry
        .read(&cli.input)
        .with_context(|| format!("failed to read `{}`", cli.input.display()))?;
    log::info!(
        "read {} points and {} cells from `{}`",
        mesh.point_count(),
        mesh.cell_count(),
        cli.input.display(),
    );

    if cli.info || cli.output.is_none() {
        print_info(&mesh);
    }
    if let Some(output) = cli.output.as_ref() {
        let compression = cli.compression();
        let descriptor = registry
            .resolve(output)
            .with_context(|| format!("cannot write `{}`", output.display()))?;
        if compression.is_compressed() && !descriptor.supports_compression() {
            log::warn!(
                "{} does not support compression; writing uncompressed",
                descriptor.codec().name(),
            );
        }
        registry
            .write_with(&mesh, output, WriteOptions { compression })
            .with_context(|| format!("failed to write `{}`", output.display()))?;
        log::info!("wrote `{}` ({:?})", output.display(), compression);
    }
    else if cli.compression || cli.level.is_some() {
        bail!("compression requires an output path");
    }
    Ok(())
}
