// Moves the sources of a run out of the way once all the shifts are done.

use std::fs;
use std::io;

use crate::conv::*;

/// Moves every distinct source of the shifts that archive their sources into
/// `folder`. A file already present there is replaced.
///
/// Returns the new paths. Failures are logged and the file is left in place.
pub fn archive_sources(configs: &[ShiftConfig], folder: &Path) -> Vec<PathBuf> {
    let sources: BTreeSet<&PathBuf> = configs
        .iter()
        .filter(|c| c.archive_sources)
        .flat_map(|c| [&c.group_a.source, &c.group_b.source])
        .flatten()
        .collect();
    if sources.is_empty() {
        return vec![];
    }
    if let Err(e) = fs::create_dir_all(folder) {
        warn!("Cannot create the archive folder {:?}: {}", folder, e);
        return vec![];
    }

    let mut moved: Vec<PathBuf> = Vec::new();
    for source in sources {
        let name = match source.file_name() {
            Some(n) => n,
            None => continue,
        };
        let destination = folder.join(name);
        match move_file(source, &destination) {
            Ok(()) => {
                debug!("Archived {:?} -> {:?}", source, destination);
                moved.push(destination);
            }
            Err(e) => warn!("Cannot archive {:?}: {}", source, e),
        }
    }
    moved
}

// An existing file at `to` is only replaced once the source is known to be
// there and its content has been copied next to it.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if !from.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", from.display()),
        ));
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // rename does not cross file systems.
    let partial = to.with_extension("partial");
    fs::copy(from, &partial)?;
    if to.exists() {
        fs::remove_file(to)?;
    }
    fs::rename(&partial, to)?;
    fs::remove_file(from)
}
