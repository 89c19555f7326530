use std::path::{Path, PathBuf};

use color_eyre::Result;

use crate::args::{Backend, KinshipArgs};
use crate::control::Control;
use crate::utils::append_to_prefix;

use super::gemma1::Gemma1;
use super::kinship::NativeKinship;

/// Kinship matrix kind, named after the GEMMA `-gk` value that selects it.
///
/// A standardized request selects `-gk 1` and anything else `-gk 2`, the pairing the existing
/// GEMMA2 pipelines use. Note that GEMMA itself calls `-gk 1` the centered matrix (`.cXX.txt`) and
/// `-gk 2` the standardized one (`.sXX.txt`). The native backend writes to the same file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrmKind {
    Gk1,
    Gk2,
}

impl GrmKind {
    pub fn new(standardized: bool) -> Self {
        match standardized {
            true => Self::Gk1,
            false => Self::Gk2,
        }
    }

    /// Value of the GEMMA `-gk` option
    pub fn gemma_flag(&self) -> u8 {
        match self {
            Self::Gk1 => 1,
            Self::Gk2 => 2,
        }
    }

    /// File GEMMA writes for this `-gk` value, relative to the output prefix
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Gk1 => ".cXX.txt",
            Self::Gk2 => ".sXX.txt",
        }
    }

    pub fn output_path(&self, out_prefix: &Path) -> PathBuf {
        append_to_prefix(out_prefix, self.suffix())
    }
}

/// A kinship implementation. Writes the matrix for the dataset of `control` and returns where.
pub trait KinshipBackend {
    fn name(&self) -> &'static str;

    fn compute_kinship(&self, control: &Control, standardized: bool) -> Result<PathBuf>;
}

pub fn get_backend(backend: Backend, args: &KinshipArgs) -> Box<dyn KinshipBackend> {
    match backend {
        Backend::Gemma1 => Box::new(Gemma1::new(args)),
        Backend::Native => Box::new(NativeKinship::new(args)),
    }
}

/// Run the selected kinship backend exactly once. `scale` containing `standardized` selects the
/// standardized estimator. `loco` is handed over as is.
pub fn compute_kinship(
    control: &Control,
    backend: Backend,
    scale: &[String],
    loco: bool,
    args: &KinshipArgs,
) -> Result<PathBuf> {
    let backend = get_backend(backend, args);
    dispatch(control, backend.as_ref(), scale, loco)
}

pub fn dispatch(
    control: &Control,
    backend: &dyn KinshipBackend,
    scale: &[String],
    loco: bool,
) -> Result<PathBuf> {
    let standardized = scale.iter().any(|s| s == "standardized");

    if loco {
        tracing::warn!(
            "Leave-one-chromosome-out is not implemented by the {} backend, computing a single matrix",
            backend.name()
        );
    }

    tracing::info!(
        "Computing a kinship matrix (standardized: {standardized}, GEMMA -gk {}) with the {} backend",
        GrmKind::new(standardized).gemma_flag(),
        backend.name()
    );

    backend.compute_kinship(control, standardized)
}

#[doc(hidden)]
pub fn run(
    control: PathBuf,
    backend: Backend,
    scale: Vec<String>,
    loco: bool,
    args: KinshipArgs,
) -> Result<PathBuf> {
    let control = Control::load(&control)?;
    let path = compute_kinship(&control, backend, &scale, loco, &args)?;
    tracing::info!("Kinship matrix written to {path:?}");
    Ok(path)
}
