// QTLPREP - QTL mapping data preparation
// Copyright (C) 2024  Osma S. Rautila
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! QTLPREP - QTL mapping data preparation
//!
//! This library and program prepare R/qtl2 style datasets for QTL mapping. A dataset is described
//! by a JSON control file which points to a phenotype and a genotype file.
//!
//! QTLPREP commands
//!
//! * Remove individuals without a phenotype value and markers below a minor allele frequency
//! * Compute a kinship (genetic relationship) matrix in-process or with GEMMA 1
//!
//! # Getting started
//!
//! Rust and its package manager cargo can be installed following the instruction for [rustup](https://rustup.rs/).
//!
//! ```bash
//! cargo install --path qtlprep
//! ```
//!
//! ## Running QTLPREP
//!
//! ```bash
//! qtlprep --help
//! ```
//! Filter a dataset and compute the kinship matrix of the result:
//! ```bash
//! qtlprep filter data/bxd/control.json --maf 0.05 -o ${outdir}/bxd
//!
//! qtlprep grm ${outdir}/bxd.json --impl native --scale standardized -o ${outdir}/bxd
//!
//! qtlprep grm ${outdir}/bxd.json --impl gemma1 --gemma-bin ~/bin/gemma -o ${outdir}/bxd
//! ```
//!

#[doc(hidden)]
pub mod args;

/// BIMBAM conversion for GEMMA
pub mod bimbam;

/// R/qtl2 control files
pub mod control;

#[doc(hidden)]
pub mod io;

/// Output files that only appear once completely written
pub mod safe;

#[doc(hidden)]
pub mod utils;

#[doc(hidden)]
pub mod error;

#[cfg(feature = "clap")]
pub mod clap;
