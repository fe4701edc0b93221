//! Reading seed programs and storing findings on disk.

use jsf_core::{Error, Result};
use jsf_ir::Program;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Extension of serialized program files
pub const PROGRAM_EXTENSION: &str = "bin";

/// Load every program file in `dir`, in file name order.
///
/// Files that cannot be read or decoded are reported and skipped. Only a
/// missing or unreadable directory is an error.
pub fn load_seed_dir(dir: &Path) -> Result<Vec<Program>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == PROGRAM_EXTENSION))
        .collect();
    paths.sort();

    let mut programs = Vec::with_capacity(paths.len());
    let mut skipped = 0;
    for path in paths {
        match read_program(&path) {
            Ok(program) => programs.push(program),
            Err(e) => {
                skipped += 1;
                warn!(path = %path.display(), error = %e, "skipping seed");
            }
        }
    }
    info!(dir = %dir.display(), loaded = programs.len(), skipped, "loaded seeds");
    Ok(programs)
}

pub fn read_program(path: &Path) -> Result<Program> {
    let identifier = path.display().to_string();
    let bytes = fs::read(path).map_err(|e| Error::decoding(identifier.clone(), e))?;
    Program::from_bytes(&identifier, &bytes)
}

/// Write `program` to `dir` as `<id>.bin`, creating the directory if needed
pub fn write_program(dir: &Path, program: &Program) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.{}", program.id(), PROGRAM_EXTENSION));
    fs::write(&path, program.to_bytes()?)?;
    Ok(path)
}

/// Store a crashing program next to its lifted text
pub fn store_crash(dir: &Path, program: &Program, signal: i32, lifted: &str) -> Result<PathBuf> {
    let path = write_program(dir, program)?;
    let text = format!("// signal {}\n{}", signal, lifted);
    fs::write(path.with_extension("txt"), text)?;
    Ok(path)
}
