//! Conversion to the BIMBAM formats read by GEMMA.
//!
//! <https://www.haplotype.org/download/bimbam-manual.pdf>
//!
//! The mean genotype file has one line per SNP: the SNP ID, two allele types and one mean genotype
//! (dosage between 0 and 2) per individual, e.g. `rs1,X,Y,0,1,2`. The phenotype file has one value
//! per line in the same individual order, `NA` for missing.
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

use crate::control::Control;
use crate::error::QtlError::{MissingColumnError, UnknownGenotypeError};
use crate::io::{iter_geno, iter_pheno};
use crate::safe::ScopedOutput;
use crate::utils::append_to_prefix;

/// Turns genotype calls into dosages using the code table of a control file.
///
/// The smallest code maps to dosage 0, so `{"A": 1, "H": 2, "B": 3}` gives A=0, H=1, B=2.
#[derive(Debug, Clone)]
pub struct DosageCoder {
    codes: BTreeMap<String, i64>,
    min: i64,
    na_strings: Vec<String>,
}

impl DosageCoder {
    pub fn new(control: &Control) -> Self {
        let min = control.genotypes.values().copied().min().unwrap_or_default();
        Self {
            codes: control.genotypes.clone(),
            min,
            na_strings: control.na_strings.clone(),
        }
    }

    /// `None` for a missing call
    pub fn dosage(&self, marker: &str, call: &str) -> Result<Option<f64>> {
        if self.na_strings.iter().any(|na| na == call) {
            return Ok(None);
        }
        match self.codes.get(call) {
            Some(code) => Ok(Some((code - self.min) as f64)),
            None => Err(eyre!(UnknownGenotypeError((marker.to_string(), call.to_string())))),
        }
    }

    pub fn dosages(&self, marker: &str, calls: &[String]) -> Result<Vec<Option<f64>>> {
        calls.iter().map(|c| self.dosage(marker, c)).collect()
    }
}

/// Write the genotypes and the first phenotype column of the dataset as BIMBAM files next to
/// `out_prefix`. Returns the paths of the genotype and phenotype files.
pub fn write_bimbam(control: &Control, out_prefix: &Path) -> Result<(PathBuf, PathBuf)> {
    let geno_path = append_to_prefix(out_prefix, "_bimbam_geno.txt");
    let pheno_path = append_to_prefix(out_prefix, "_bimbam_pheno.txt");
    let coder = DosageCoder::new(control);

    let mut geno = ScopedOutput::create(&geno_path)?;
    let mut n_markers = 0;
    for record in iter_geno(&control.geno_path(), control.geno_compact, control)? {
        let record = record?;
        write!(geno, "{},X,Y", record.marker)?;
        for dosage in coder.dosages(&record.marker, &record.calls)? {
            match dosage {
                Some(d) => write!(geno, ",{d}")?,
                None => write!(geno, ",NA")?,
            }
        }
        writeln!(geno)?;
        n_markers += 1;
    }

    let mut pheno = ScopedOutput::create(&pheno_path)?;
    let mut n_individuals = 0;
    for row in iter_pheno(&control.pheno_path(), true, control)? {
        let row = row?;
        if row.is_header() {
            continue;
        }
        let value = row
            .get(1)
            .ok_or_else(|| eyre!(MissingColumnError((1, row.line()))))?;
        match control.is_missing(value) {
            true => writeln!(pheno, "NA")?,
            false => writeln!(pheno, "{value}")?,
        }
        n_individuals += 1;
    }

    let geno_path = geno.commit().wrap_err("Failed writing BIMBAM genotypes")?;
    let pheno_path = pheno.commit().wrap_err("Failed writing BIMBAM phenotypes")?;
    tracing::info!(
        "Wrote {n_markers} markers and {n_individuals} individuals to {geno_path:?} and {pheno_path:?}"
    );

    Ok((geno_path, pheno_path))
}
