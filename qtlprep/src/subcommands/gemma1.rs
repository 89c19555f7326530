use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use itertools::Itertools;

use crate::args::KinshipArgs;
use crate::bimbam::write_bimbam;
use crate::control::Control;
use crate::error::QtlError::BackendExitError;
use crate::utils::split_out_prefix;

use super::grm::{GrmKind, KinshipBackend};

/// Kinship through the GEMMA 1 executable, fed with BIMBAM files converted from the dataset.
#[derive(Debug, Clone)]
pub struct Gemma1 {
    pub bin: PathBuf,
    pub out_prefix: PathBuf,
}

impl Gemma1 {
    pub fn new(args: &KinshipArgs) -> Self {
        Self {
            bin: args.gemma_bin.clone(),
            out_prefix: args.out_prefix.clone(),
        }
    }

    /// Arguments in the order GEMMA is called with
    pub fn args(outdir: &Path, basename: &str, kind: GrmKind, geno: &Path, pheno: &Path) -> Vec<OsString> {
        vec![
            "-debug".into(),
            "-debug-data".into(),
            "-outdir".into(),
            outdir.into(),
            "-o".into(),
            basename.into(),
            "-gk".into(),
            kind.gemma_flag().to_string().into(),
            "-g".into(),
            geno.into(),
            "-p".into(),
            pheno.into(),
        ]
    }
}

impl KinshipBackend for Gemma1 {
    fn name(&self) -> &'static str {
        "GEMMA1"
    }

    fn compute_kinship(&self, control: &Control, standardized: bool) -> Result<PathBuf> {
        let (outdir, basename) = split_out_prefix(&self.out_prefix)?;
        let kind = GrmKind::new(standardized);

        tracing::info!("Computing GRM with GEMMA1");
        tracing::info!("Convert to intermediate BIMBAM");
        let (geno, pheno) = write_bimbam(control, &self.out_prefix)?;
        tracing::info!("Call gemma with {geno:?}");

        let args = Self::args(&outdir, &basename, kind, &geno, &pheno);
        let cmd = std::iter::once(self.bin.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy())
            .join(" ");
        tracing::warn!("Calling: {cmd}");

        // Blocks until GEMMA exits, GEMMA is deterministic so a failure is not retried
        let status = Command::new(&self.bin)
            .args(&args)
            .status()
            .wrap_err(eyre!("Failed to start {:?}", self.bin))?;

        if !status.success() {
            return Err(eyre!(BackendExitError((cmd, status.code()))));
        }

        let output = outdir.join(format!("{basename}{}", kind.suffix()));
        tracing::info!("Writing to {output:?}");
        Ok(output)
    }
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;

    #[test]
    fn test_gemma_args() {
        let args = Gemma1::args(Path::new("out"), "bxd", GrmKind::new(false), Path::new("g.txt"), Path::new("p.txt"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(
            args,
            vec!["-debug", "-debug-data", "-outdir", "out", "-o", "bxd", "-gk", "2", "-g", "g.txt", "-p", "p.txt"]
        );
    }

    #[test]
    fn test_standardized_selects_gk_1() {
        let args = Gemma1::args(Path::new("."), "bxd", GrmKind::new(true), Path::new("g.txt"), Path::new("p.txt"));
        assert_eq!(args[6], OsString::from("-gk"));
        assert_eq!(args[7], OsString::from("1"));
    }
}
