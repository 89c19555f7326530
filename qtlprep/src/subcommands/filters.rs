use std::path::{Path, PathBuf};

use color_eyre::eyre::{ensure, eyre, WrapErr};
use color_eyre::Result;
use indexmap::IndexMap;
use itertools::Itertools;

use crate::control::{Control, FilterOutcome};
use crate::error::QtlError::{
    CompactCallError, InvalidPhenotypeColumnError, MissingColumnError, PositionOutOfRangeError,
};
use crate::io::{finish_tsv_writer, iter_geno, iter_pheno, open_tsv_writer, PhenoRow};
use crate::safe::commit_all;
use crate::utils::{append_to_prefix, file_name};

/// Does the marker pass the minor allele frequency threshold.
///
/// Missing calls are dropped first. Calls are counted as distinct strings and ranked by count,
/// the count of the second ranked call is taken as the minor allele count. Equal counts keep the
/// order in which the calls were first seen in `calls`, which carries no biological meaning.
/// The ratio to the number of non-missing calls has to be strictly larger than the threshold.
pub fn maf_filter(marker: &str, threshold: f64, calls: &[&str], na_strings: &[String]) -> bool {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for call in calls
        .iter()
        .filter(|c| !na_strings.iter().any(|na| na == *c))
    {
        *counts.entry(*call).or_default() += 1;
    }
    let non_missing: usize = counts.values().sum();

    if counts.len() < 2 {
        tracing::debug!("MAF filter {threshold} fails {counts:?} at {marker}");
        return false;
    }

    // Stable sort, ties stay in encounter order
    let ranked: Vec<usize> = counts
        .values()
        .copied()
        .sorted_by(|a, b| b.cmp(a))
        .collect();
    let minor = ranked[1];

    let passes = minor as f64 / non_missing as f64 > threshold;
    if !passes {
        tracing::debug!("MAF filter {threshold} fails {counts:?} at {marker}");
    }
    passes
}

/// Calls of a marker as stored in a compact genotype file, one character per individual.
///
/// Missing calls are written as the first single character missing token. Any other call has to
/// be a single character, otherwise the individuals could not be told apart when reading back.
pub fn compact_calls(marker: &str, calls: &[&str], na_strings: &[String]) -> Result<String> {
    let na = na_strings.iter().find(|na| na.chars().count() == 1);

    let mut compact = String::with_capacity(calls.len());
    for &call in calls {
        let call = match na {
            Some(na) if na_strings.iter().any(|s| s == call) => na.as_str(),
            _ => call,
        };
        ensure!(
            call.chars().count() == 1,
            CompactCallError((marker.to_string(), call.to_string()))
        );
        compact.push_str(call);
    }
    Ok(compact)
}

/// Individuals kept from the phenotype file. Positions are stream positions, the header is
/// position 0 and never part of these lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retained {
    pub ids: Vec<String>,
    pub positions: Vec<usize>,
}

impl Retained {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Pick the calls of the retained individuals. Position `p` is call `p - 1`, because the
    /// genotype columns have no header row in front of the first individual.
    pub fn project<'a>(&self, marker: &str, calls: &'a [String]) -> Result<Vec<&'a str>> {
        self.positions
            .iter()
            .map(|&pos| {
                calls
                    .get(pos - 1)
                    .map(String::as_str)
                    .ok_or_else(|| eyre!(PositionOutOfRangeError((marker.to_string(), pos, calls.len()))))
            })
            .collect()
    }
}

/// Scan the phenotype file, write `id<TAB>value` for the header and every individual with a
/// non-missing value in `column`.
pub fn filter_phenotypes(
    control: &Control,
    column: usize,
    writer: &mut csv::Writer<impl std::io::Write>,
) -> Result<Retained> {
    let path = control.pheno_path();
    tracing::info!("Reading phenotypes from {path:?}");

    let mut ids = vec![];
    let mut positions = vec![];

    for (pos, row) in iter_pheno(&path, true, control)?.enumerate() {
        let row = row?;
        let value = row
            .get(column)
            .ok_or_else(|| eyre!(MissingColumnError((column, row.line()))))?;

        match &row {
            PhenoRow::Header { .. } => {}
            PhenoRow::Individual { .. } if control.is_missing(value) => continue,
            PhenoRow::Individual { .. } => {
                ids.push(row.id().to_string());
                positions.push(pos);
            }
        }
        writer.write_record([row.id(), value])?;
    }

    tracing::info!(
        "Retained {} individuals with a phenotype value in column {column}",
        ids.len()
    );
    Ok(Retained { ids, positions })
}

/// Stream the genotype file and write the markers passing the MAF filter for the retained
/// individuals. Returns the number of written markers.
pub fn filter_genotypes(
    control: &Control,
    retained: &Retained,
    maf: f64,
    writer: &mut csv::Writer<impl std::io::Write>,
) -> Result<usize> {
    let path = control.geno_path();
    tracing::info!("Reading genotypes from {path:?}");

    let header = std::iter::once("marker").chain(retained.ids.iter().map(String::as_str));
    writer.write_record(header)?;

    let mut markers = 0;
    let mut total = 0;

    // Compact files are written by this program and always carry a header
    for record in iter_geno(&path, control.geno_compact, control)? {
        let record = record?;
        total += 1;

        let calls = retained.project(&record.marker, &record.calls)?;
        let compact = compact_calls(&record.marker, &calls, &control.na_strings)?;
        if maf_filter(&record.marker, maf, &calls, &control.na_strings) {
            markers += 1;
            writer.write_record([record.marker.as_str(), compact.as_str()])?;
        }
    }

    tracing::info!("{markers} out of {total} markers pass MAF > {maf}");
    Ok(markers)
}

/// Remove individuals missing the phenotype in `column` and markers failing the MAF threshold.
///
/// Writes `<prefix>_pheno.tsv`, `<prefix>_geno.txt` and finally the new control `<prefix>.json`
/// which is returned. Nothing is moved into place before all three files have been completely
/// written.
pub fn run(control_path: PathBuf, column: usize, maf: f64, out_prefix: PathBuf) -> Result<Control> {
    ensure!(column >= 1, InvalidPhenotypeColumnError(column));
    ensure!(
        (0.0..1.0).contains(&maf),
        "MAF threshold {maf} needs to be within [0, 1)"
    );

    let control = Control::load(&control_path)?;
    tracing::debug!("{control:?}");

    let (pheno_out, geno_out, control_out) = output_paths(&out_prefix);

    let mut pheno_writer = open_tsv_writer(&pheno_out)?;
    let retained = filter_phenotypes(&control, column, &mut pheno_writer)
        .wrap_err(eyre!("Failed filtering phenotypes of {control_path:?}"))?;

    let mut geno_writer = open_tsv_writer(&geno_out)?;
    let markers = filter_genotypes(&control, &retained, maf, &mut geno_writer)
        .wrap_err(eyre!("Failed filtering genotypes of {control_path:?}"))?;

    let pheno_output = finish_tsv_writer(pheno_writer)?;
    let geno_output = finish_tsv_writer(geno_writer)?;

    let outcome = FilterOutcome {
        pheno: file_name(&pheno_out)?,
        geno: file_name(&geno_out)?,
        individuals: retained.len(),
        markers,
        maf,
    };
    let filtered = control.filtered(&control_out, outcome)?;
    let control_output = filtered.to_output(&control_out)?;

    // Control file last, if any commit fails the files moved into place before it are removed
    commit_all(vec![pheno_output, geno_output, control_output])?;
    tracing::info!("Wrote control file {control_out:?}");

    Ok(filtered)
}

/// Paths of the files [`run`] writes for `prefix`, in the order pheno, geno, control.
pub fn output_paths(out_prefix: &Path) -> (PathBuf, PathBuf, PathBuf) {
    (
        append_to_prefix(out_prefix, "_pheno.tsv"),
        append_to_prefix(out_prefix, "_geno.txt"),
        append_to_prefix(out_prefix, ".json"),
    )
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;

    fn na() -> Vec<String> {
        vec![String::from("-"), String::from("NA")]
    }

    #[test]
    fn test_maf_monomorphic_fails() {
        assert!(!maf_filter("rs1", 0.0, &["A", "A", "A", "A"], &na()));
        assert!(!maf_filter("rs1", 0.0, &["A", "NA", "-", "A"], &na()));
        assert!(!maf_filter("rs1", 0.0, &["NA", "NA"], &na()));
        assert!(!maf_filter("rs1", 0.0, &[], &na()));
    }

    #[test]
    fn test_maf_passes() {
        // 1 / 4 = 0.25
        assert!(maf_filter("rs2", 0.1, &["A", "A", "A", "T"], &na()));
        assert!(!maf_filter("rs2", 0.3, &["A", "A", "A", "T"], &na()));
    }

    #[test]
    fn test_maf_strict_threshold() {
        assert!(!maf_filter("rs2", 0.25, &["A", "A", "A", "T"], &na()));
        assert!(maf_filter("rs2", 0.2499, &["A", "A", "A", "T"], &na()));
    }

    #[test]
    fn test_maf_ignores_missing() {
        // 1 / 3 non-missing
        assert!(maf_filter("rs3", 0.3, &["A", "NA", "A", "B", "-"], &na()));
        assert!(!maf_filter("rs3", 0.34, &["A", "NA", "A", "B", "-"], &na()));
    }

    #[test]
    fn test_maf_takes_second_most_common() {
        // A: 5, H: 3, B: 1. The rarest value would fail 0.2, the second most common passes.
        let calls = ["A", "A", "A", "A", "A", "H", "H", "H", "B"];
        assert!(maf_filter("rs4", 0.2, &calls, &na()));
        assert!(!maf_filter("rs4", 0.34, &calls, &na()));
    }

    #[test]
    fn test_maf_ties_keep_encounter_order() {
        // B and A tie for the top, H is third: the minor count is the tied count
        let calls = ["B", "A", "H", "A", "B"];
        assert!(maf_filter("rs5", 0.39, &calls, &na()));
        assert!(!maf_filter("rs5", 0.4, &calls, &na()));
    }

    #[test]
    fn test_compact_calls() {
        assert_eq!(compact_calls("rs1", &["A", "B", "H"], &na()).unwrap(), "ABH");
        assert_eq!(compact_calls("rs1", &["A", "NA", "-"], &na()).unwrap(), "A--");
        assert_eq!(compact_calls("rs1", &[], &na()).unwrap(), "");

        let err = compact_calls("rs1", &["A", "AB", "B"], &na()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::QtlError>(),
            Some(CompactCallError((marker, call))) if marker == "rs1" && call == "AB"
        ));

        // Without a single character missing token, missing calls can't be stored either
        assert!(compact_calls("rs1", &["A", "NA"], &[String::from("NA")]).is_err());
    }

    #[test]
    fn test_project() {
        let retained = Retained {
            ids: vec![String::from("ind1"), String::from("ind3")],
            positions: vec![1, 3],
        };
        let calls: Vec<String> = ["A", "B", "H"].iter().map(|s| s.to_string()).collect();
        assert_eq!(retained.project("rs1", &calls).unwrap(), vec!["A", "H"]);

        let calls: Vec<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
        assert!(retained.project("rs1", &calls).is_err());
    }

    #[test]
    fn test_output_paths() {
        let (p, g, c) = output_paths(Path::new("out/run1"));
        assert_eq!(p, PathBuf::from("out/run1_pheno.tsv"));
        assert_eq!(g, PathBuf::from("out/run1_geno.txt"));
        assert_eq!(c, PathBuf::from("out/run1.json"));
    }
}
