use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::error::RotationError;
use crate::util::paths::generation_path;

/// Shifts `root.i.gz` up by one generation and compresses `root` into `root.1.gz`.
///
/// `depth` counts the active log, so at most `depth - 1` compressed generations
/// survive. Missing generations are skipped; any other failure to shift stops the
/// rotation before `root.1.gz` is overwritten. The uncompressed log is removed once
/// its compressed copy is in place.
pub fn rotate(root: &Path, depth: usize) -> Result<(), RotationError> {
    for index in (1..depth.saturating_sub(1)).rev() {
        let from = generation_path(root, index);
        let to = generation_path(root, index + 1);
        match fs::rename(&from, &to) {
            Ok(()) => debug!(from = %from.display(), to = %to.display(), "shifted log generation"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(RotationError::Shift { from, to, source }),
        }
    }

    if !root.exists() {
        return Ok(());
    }

    if depth > 1 {
        compress(root, &generation_path(root, 1))?;
    }
    fs::remove_file(root).map_err(|source| RotationError::Remove {
        path: root.to_path_buf(),
        source,
    })
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name: OsString = dest.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

fn compress(source: &Path, dest: &Path) -> Result<(), RotationError> {
    let reader = File::open(source).map_err(|source_err| RotationError::OpenSource {
        path: source.to_path_buf(),
        source: source_err,
    })?;
    let partial = partial_path(dest);
    let writer = File::create(&partial).map_err(|source| RotationError::CreateDestination {
        path: partial.clone(),
        source,
    })?;

    let result = stream_gzip(reader, writer).and_then(|()| fs::rename(&partial, dest));
    if let Err(err) = result {
        let _ = fs::remove_file(&partial);
        return Err(RotationError::Compress {
            path: dest.to_path_buf(),
            source: err,
        });
    }
    debug!(source = %source.display(), dest = %dest.display(), "compressed run log");
    Ok(())
}

fn stream_gzip(reader: File, writer: File) -> io::Result<()> {
    let mut input = BufReader::new(reader);
    let mut encoder = GzEncoder::new(BufWriter::new(writer), Compression::default());
    io::copy(&mut input, &mut encoder)?;
    let output = encoder.finish()?;
    output
        .into_inner()
        .map_err(|err| err.into_error())?
        .sync_all()
}
