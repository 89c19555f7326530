#![allow(dead_code)]
use std::path::{Path, PathBuf};

#[cfg(feature = "clap")]
use qtlprep::clap::LogAndVerbosity;

pub const TEST_DATA: &str = "tests/data/bxd";
pub const TEST_CONTROL: &str = "tests/data/bxd/control.json";
pub const DATASET_FILES: [&str; 4] = ["control.json", "pheno.tsv", "geno.tsv", "gmap.csv"];

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// File names in `dir`, hidden temporary files included
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Write a minimal dataset with default control settings into `dir`, returns the control path
pub fn write_dataset(dir: &Path, pheno: &str, geno: &str) -> PathBuf {
    write_file(dir, "pheno.tsv", pheno);
    write_file(dir, "geno.tsv", geno);
    write_file(dir, "control.json", r#"{"pheno": "pheno.tsv", "geno": "geno.tsv"}"#)
}

#[cfg(feature = "clap")]
pub fn silent_verbosity() -> LogAndVerbosity {
    LogAndVerbosity {
        verbosity: 1,
        log_file: None,
        silent: false,
    }
}
