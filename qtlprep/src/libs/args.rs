use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct FilterArgs {
    /// R/qtl2 control file (JSON)
    pub control: PathBuf,

    /// Phenotype column used for removing individuals, the ID column is 0
    #[cfg_attr(feature = "clap", arg(short = 'c', long = "column", default_value_t = 1))]
    pub column: usize,

    /// Minor allele frequency threshold, markers need MAF > threshold
    #[cfg_attr(feature = "clap", arg(long, default_value_t = 0.01))]
    pub maf: f64,

    /// Output prefix for the filtered files and the new control file
    #[cfg_attr(feature = "clap", arg(short = 'o', long = "out-prefix", default_value_os_t = PathBuf::from("output/result"), value_hint = clap::ValueHint::FilePath))]
    pub out_prefix: PathBuf,
}

impl Default for FilterArgs {
    fn default() -> Self {
        Self {
            control: PathBuf::new(),
            column: 1,
            maf: 0.01,
            out_prefix: PathBuf::from("output/result"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct KinshipArgs {
    /// Output prefix, the matrix is written to [prefix].cXX.txt or [prefix].sXX.txt
    #[cfg_attr(feature = "clap", arg(short = 'o', long = "out-prefix", default_value_os_t = PathBuf::from("output/result"), value_hint = clap::ValueHint::FilePath))]
    pub out_prefix: PathBuf,

    /// GEMMA 1 executable used by the gemma1 implementation
    #[cfg_attr(feature = "clap", arg(long, default_value_os_t = PathBuf::from("gemma"), value_hint = clap::ValueHint::ExecutablePath))]
    pub gemma_bin: PathBuf,
}

impl Default for KinshipArgs {
    fn default() -> Self {
        Self {
            out_prefix: PathBuf::from("output/result"),
            gemma_bin: PathBuf::from("gemma"),
        }
    }
}

/// Kinship implementation
#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Backend {
    /// Convert to BIMBAM and run GEMMA 1 as a separate process
    Gemma1,
    #[default]
    /// Compute the matrix in-process
    Native,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Self::Gemma1 => write!(f, "GEMMA1"),
            Self::Native => write!(f, "native"),
        }
    }
}
