use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use nod_disc::{
    builder, disc,
    extract::{self, ExtractOptions},
    gcn,
    structs::{DiscHeader, WiiPartType},
};

#[derive(Debug, Parser)]
#[clap(about = "read, build, and merge GameCube and Wii optical disc images")]
enum Commands {
    /// Extract a disc image's system files and file tree into a directory.
    Extract {
        /// Overwrite files that already exist at the destination.
        #[clap(short = 'f', long)]
        force: bool,
        /// Report per-file extraction progress.
        #[clap(short = 'v', long)]
        verbose: bool,
        image_in: PathBuf,
        dir_out: Option<PathBuf>,
    },
    /// Build a fresh GameCube disc image from a file system root, DOL and apploader.
    Makegcn {
        game_id: String,
        game_title: String,
        fsroot_in: PathBuf,
        dol_in: PathBuf,
        apploader_in: PathBuf,
        image_out: Option<PathBuf>,
    },
    /// Build a fresh single-layer Wii disc image.
    Makewiisl {
        game_id: String,
        game_title: String,
        fsroot_in: PathBuf,
        dol_in: PathBuf,
        apploader_in: PathBuf,
        parthead_in: PathBuf,
        image_out: Option<PathBuf>,
    },
    /// Build a fresh dual-layer Wii disc image.
    Makewiidl {
        game_id: String,
        game_title: String,
        fsroot_in: PathBuf,
        dol_in: PathBuf,
        apploader_in: PathBuf,
        parthead_in: PathBuf,
        image_out: Option<PathBuf>,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Disc(#[from] nod_disc::Error),
    #[error("{0}")]
    Build(String),
}

fn default_dir_out(image_in: &PathBuf) -> PathBuf {
    let stem = image_in.file_stem().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("extracted"));
    PathBuf::from(stem)
}

fn default_image_out(game_id: &str, ext: &str) -> PathBuf {
    PathBuf::from(format!("{game_id}.{ext}"))
}

fn run_extract(force: bool, verbose: bool, image_in: PathBuf, dir_out: Option<PathBuf>) -> Result<(), CliError> {
    let dest_dir = dir_out.unwrap_or_else(|| default_dir_out(&image_in));
    let opts = ExtractOptions { force, verbose };
    let mut disc = disc::Disc::open(&image_in)?;
    let mut progress = |frac: f64, name: &str, bytes: u64| {
        if verbose {
            println!("[{:>5.1}%] {name} ({bytes} bytes)", frac * 100.0);
        }
    };
    match &mut disc {
        disc::Disc::Gcn(reader) => extract::extract_gcn(reader, &dest_dir, &opts, &mut progress)?,
        disc::Disc::Wii(reader) => {
            extract::extract_wii(reader, &dest_dir, &WiiPartType::Data, true, &opts, &mut progress)?
        }
    }
    Ok(())
}

fn run_makegcn(
    game_id: String,
    game_title: String,
    fsroot_in: PathBuf,
    dol_in: PathBuf,
    apploader_in: PathBuf,
    image_out: Option<PathBuf>,
) -> Result<(), CliError> {
    let dest_path = image_out.unwrap_or_else(|| default_image_out(&game_id, "gcm"));
    let disc_header = DiscHeader::new_gcn(&game_id, &game_title);
    let mut dest = OpenOptions::new().truncate(true).create(true).read(true).write(true).open(&dest_path)?;
    let progress: Box<dyn FnMut(usize, usize)> = Box::new(|done, total| println!("[{done}/{total}] copied"));
    gcn::build_gcn_image(&mut dest, disc_header, dol_in, apploader_in, fsroot_in, Some(progress))
        .map_err(|e| CliError::Build(e.to_string()))?;
    Ok(())
}

fn run_makewii(
    game_id: String,
    game_title: String,
    fsroot_in: PathBuf,
    dol_in: PathBuf,
    apploader_in: PathBuf,
    parthead_in: PathBuf,
    image_out: Option<PathBuf>,
    dual_layer: bool,
) -> Result<(), CliError> {
    let ext = if dual_layer { "wdl" } else { "wsl" };
    let dest_path = image_out.unwrap_or_else(|| default_image_out(&game_id, ext));
    let disc_header = DiscHeader::new_wii(&game_id, &game_title);
    let parthead_bytes = fs::read(&parthead_in)?;
    let mut dest = OpenOptions::new().truncate(true).create(true).read(true).write(true).open(&dest_path)?;
    let progress: Box<dyn FnMut(usize, usize)> = Box::new(|done, total| println!("[{done}/{total}] copied"));
    builder::build_wii_image(
        &mut dest,
        disc_header,
        &parthead_bytes,
        dol_in,
        apploader_in,
        fsroot_in,
        dual_layer,
        Some(progress),
    )?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Commands::parse();
    let result = match args {
        Commands::Extract { force, verbose, image_in, dir_out } => run_extract(force, verbose, image_in, dir_out),
        Commands::Makegcn { game_id, game_title, fsroot_in, dol_in, apploader_in, image_out } => {
            run_makegcn(game_id, game_title, fsroot_in, dol_in, apploader_in, image_out)
        }
        Commands::Makewiisl { game_id, game_title, fsroot_in, dol_in, apploader_in, parthead_in, image_out } => {
            run_makewii(game_id, game_title, fsroot_in, dol_in, apploader_in, parthead_in, image_out, false)
        }
        Commands::Makewiidl { game_id, game_title, fsroot_in, dol_in, apploader_in, parthead_in, image_out } => {
            run_makewii(game_id, game_title, fsroot_in, dol_in, apploader_in, parthead_in, image_out, true)
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
