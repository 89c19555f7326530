use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use tempfile::NamedTempFile;

/// An output file which only appears under its final name once [`ScopedOutput::commit`] is
/// called. The data is written to a temporary file in the destination directory, so the final
/// rename never crosses a filesystem. Dropping an uncommitted output removes the temporary file.
pub struct ScopedOutput {
    target: PathBuf,
    writer: BufWriter<NamedTempFile>,
}

impl ScopedOutput {
    pub fn create(target: &Path) -> Result<Self> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| eyre!("Output path {target:?} has no file name"))?;

        let tmp = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".tmp")
            .tempfile_in(&dir)
            .wrap_err(eyre!("Error creating a temporary file in {dir:?}"))?;

        tracing::trace!("Writing {target:?} via {:?}", tmp.path());

        Ok(Self {
            target: target.to_path_buf(),
            writer: BufWriter::new(tmp),
        })
    }

    /// Flush and move the file to its final name.
    pub fn commit(self) -> Result<PathBuf> {
        let Self { target, writer } = self;
        let tmp = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .wrap_err(eyre!("Error flushing {target:?}"))?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target)
            .map_err(|e| e.error)
            .wrap_err(eyre!("Error moving output into place at {target:?}"))?;
        Ok(target)
    }
}

/// Commit `outputs` in order. If one of them fails, the files already committed are removed so
/// that either all of the outputs exist or none of them.
pub fn commit_all(outputs: Vec<ScopedOutput>) -> Result<Vec<PathBuf>> {
    let mut committed: Vec<PathBuf> = Vec::with_capacity(outputs.len());
    for output in outputs {
        match output.commit() {
            Ok(path) => committed.push(path),
            Err(e) => {
                for path in &committed {
                    if let Err(err) = std::fs::remove_file(path) {
                        tracing::warn!("Failed removing {path:?}: {err}");
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(committed)
}

impl Write for ScopedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
