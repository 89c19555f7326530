use std::ffi::OsString;
use std::path::{Path, PathBuf};

use color_eyre::eyre::OptionExt;
use color_eyre::Result;

/// Append `suffix` to the last component of `prefix`, i.e. `out/run1` + `_geno.txt`.
pub fn append_to_prefix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut os_string: OsString = prefix.into();
    os_string.push(suffix);
    os_string.into()
}

pub fn file_name(path: &Path) -> Result<PathBuf> {
    path.file_name()
        .map(PathBuf::from)
        .ok_or_eyre("Output path has no file name")
}

// Output prefix in the format [dir]/[basename], an empty dir means the working directory
pub fn split_out_prefix(prefix: &Path) -> Result<(PathBuf, String)> {
    let dir = match prefix.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let basename = prefix
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_eyre("Output prefix has no file name")?
        .to_string();
    Ok((dir, basename))
}
