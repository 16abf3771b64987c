use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{debug, info};

use xcheck::{run_fsck, run_repair, Filesystem, FsckError, Image};

/// Verificador de consistencia para imágenes de disco xv6.
#[derive(Debug, Parser)]
#[command(name = "xcheck", version, about)]
struct Cli {
    /// Más detalle en el log (-v info, -vv debug). `XCHECK_LOG` tiene prioridad.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Revisa la imagen sin modificarla; se detiene en la primera violación.
    Check {
        /// Imagen del sistema de archivos
        image: PathBuf,
    },
    /// Enlaza en lost_found los inodos en uso que ningún directorio nombra.
    Repair {
        /// Imagen del sistema de archivos (se modifica en el sitio)
        image: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("XCHECK_LOG", level))
        .format_timestamp(None)
        .init();
}

fn check(path: &Path) -> Result<()> {
    let fs = Filesystem::load(Image::open(path)?)?;
    let report = run_fsck(&fs)?;
    info!(
        "{:?}: consistente ({} inodos en uso: {} directorios, {} archivos, {} dispositivos; {} bloques de datos)",
        path,
        report.inodes_in_use,
        report.directories,
        report.files,
        report.devices,
        report.data_blocks_in_use
    );
    Ok(())
}

fn repair(path: &Path) -> Result<()> {
    let mut fs = Filesystem::load(Image::open_rw(path)?)?;
    let result = run_repair(&mut fs);

    // Lo reparado antes de un fallo también se guarda.
    if result.is_err() && fs.image().is_dirty() {
        info!("reparación incompleta: se guardan los cambios ya hechos");
    }
    fs.flush()?;

    let report = result?;
    if report.is_noop() {
        info!("{:?}: nada que reparar", path);
    } else {
        info!(
            "{:?}: {} inodos enlazados en lost_found, {} bits del bitmap activados",
            path,
            report.reattached.len(),
            report.bitmap_bits_set.len()
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    // 1. Argumentos y log
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // 2. Colores sólo si stderr es una terminal
    if !std::io::stderr().is_terminal() {
        colored::control::set_override(false);
    }

    // 3. Ejecutar el modo pedido
    let result = match &cli.command {
        Command::Check { image } => check(image),
        Command::Repair { image } => repair(image),
    };

    // 4. Primer error: una sola línea y salida 1
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<FsckError>() {
                Some(e) if e.is_violation() => debug!("violación de invariante: {:?}", e),
                _ => debug!("fallo de acceso a la imagen: {:?}", err),
            }
            eprintln!("{} {}", "ERROR:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
