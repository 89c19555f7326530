/// Remove individuals without a phenotype and markers below a MAF threshold
pub mod filters;

/// Select and run a kinship matrix implementation
pub mod grm;

/// Kinship through the GEMMA 1 executable
pub mod gemma1;

/// In-process kinship matrix
pub mod kinship;
