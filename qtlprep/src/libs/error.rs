#[derive(Debug)]
pub enum QtlError {
    MalformedRowError((String, u64)),
    MissingColumnError((usize, u64)),
    PositionOutOfRangeError((String, usize, usize)),
    UnknownGenotypeError((String, String)),
    CompactCallError((String, String)),
    InvalidPhenotypeColumnError(usize),
    EmptyKinshipError,
    BackendExitError((String, Option<i32>)),
}

impl std::fmt::Display for QtlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedRowError((file, line)) => write!(
                f,
                "Malformed row at line {line} of {file:?}: the number of fields differs from the first row"
            ),
            Self::MissingColumnError((column, line)) => {
                write!(f, "Column {column} does not exist at line {line}")
            }
            Self::PositionOutOfRangeError((marker, pos, n_calls)) => write!(
                f,
                "Marker {marker} has {n_calls} genotype calls but individual number {pos} was requested. The phenotype and genotype files do not describe the same individuals."
            ),
            Self::UnknownGenotypeError((marker, call)) => write!(
                f,
                "Genotype call {call:?} at marker {marker} is not listed in the control file genotypes"
            ),
            Self::CompactCallError((marker, call)) => write!(
                f,
                "Genotype call {call:?} at marker {marker} is not a single character and can't be written to a compact genotype file"
            ),
            Self::InvalidPhenotypeColumnError(column) => write!(
                f,
                "Phenotype column {column} is invalid. Column 0 holds the individual IDs, phenotypes start from column 1."
            ),
            Self::EmptyKinshipError => {
                write!(f, "No usable markers left for the kinship matrix")
            }
            Self::BackendExitError((cmd, code)) => match code {
                Some(code) => write!(f, "Kinship backend exited with status {code}: {cmd}"),
                None => write!(f, "Kinship backend was terminated by a signal: {cmd}"),
            },
        }
    }
}

impl std::error::Error for QtlError {}
