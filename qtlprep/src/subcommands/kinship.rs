use std::io::Write;
use std::path::PathBuf;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use itertools::Itertools;
use ndarray::{Array2, ArrayView2};

use crate::args::KinshipArgs;
use crate::bimbam::DosageCoder;
use crate::control::Control;
use crate::error::QtlError::EmptyKinshipError;
use crate::io::iter_geno;
use crate::safe::ScopedOutput;

use super::grm::{GrmKind, KinshipBackend};

/// Markers multiplied at once
const BATCH_SIZE: usize = 1000;

/// In-process kinship matrix `K = X'X / p` over the `p` usable markers.
///
/// Missing dosages are replaced with the marker mean and every marker is centered. The
/// standardized estimator also scales each marker to unit variance. Markers without variance
/// carry no information and are skipped.
#[derive(Debug, Clone)]
pub struct NativeKinship {
    pub out_prefix: PathBuf,
}

impl NativeKinship {
    pub fn new(args: &KinshipArgs) -> Self {
        Self {
            out_prefix: args.out_prefix.clone(),
        }
    }
}

/// Center (and scale) one marker in place. Returns false if the marker has no usable variance.
pub fn normalize_marker(dosages: &[Option<f64>], standardized: bool, out: &mut Vec<f64>) -> bool {
    let observed: Vec<f64> = dosages.iter().flatten().copied().collect();
    if observed.is_empty() {
        return false;
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;

    let start = out.len();
    out.extend(dosages.iter().map(|d| d.unwrap_or(mean) - mean));
    let row = &mut out[start..];

    let var = row.iter().map(|x| x * x).sum::<f64>() / row.len() as f64;
    if var <= f64::EPSILON {
        out.truncate(start);
        return false;
    }

    if standardized {
        let sd = var.sqrt();
        row.iter_mut().for_each(|x| *x /= sd);
    }
    true
}

/// Accumulate the batch (markers x individuals) into `k`.
fn add_batch(k: &mut Array2<f64>, batch: &[f64], n: usize) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let x = ArrayView2::from_shape((batch.len() / n, n), batch)?;
    *k += &x.t().dot(&x);
    Ok(())
}

pub fn calc_kinship(control: &Control, standardized: bool) -> Result<Array2<f64>> {
    let coder = DosageCoder::new(control);
    let mut records = iter_geno(&control.geno_path(), control.geno_compact, control)?;

    let first = match records.next() {
        Some(record) => record?,
        None => return Err(eyre!(EmptyKinshipError)),
    };
    let n = first.calls.len();
    if n == 0 {
        return Err(eyre!(EmptyKinshipError));
    }

    let mut k = Array2::<f64>::zeros((n, n));
    let mut batch: Vec<f64> = Vec::with_capacity(BATCH_SIZE * n);
    let mut used = 0;
    let mut skipped = 0;

    for record in std::iter::once(Ok(first)).chain(records) {
        let record = record?;
        let dosages = coder.dosages(&record.marker, &record.calls)?;
        match normalize_marker(&dosages, standardized, &mut batch) {
            true => used += 1,
            false => {
                tracing::debug!("Skipping marker {} without variance", record.marker);
                skipped += 1;
            }
        }

        if batch.len() == BATCH_SIZE * n {
            add_batch(&mut k, &batch, n)?;
            batch.clear();
        }
    }
    add_batch(&mut k, &batch, n)?;

    if used == 0 {
        return Err(eyre!(EmptyKinshipError));
    }
    tracing::info!("Kinship matrix of {n} individuals from {used} markers, {skipped} skipped");

    k /= used as f64;
    Ok(k)
}

impl KinshipBackend for NativeKinship {
    fn name(&self) -> &'static str {
        "native"
    }

    fn compute_kinship(&self, control: &Control, standardized: bool) -> Result<PathBuf> {
        let k = calc_kinship(control, standardized)?;

        let path = GrmKind::new(standardized).output_path(&self.out_prefix);
        let mut output = ScopedOutput::create(&path)?;
        for row in k.rows() {
            writeln!(output, "{}", row.iter().join("\t"))?;
        }
        output.commit()
    }
}
