use std::io;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::{Report, Result};
use csv::{QuoteStyle, Reader, ReaderBuilder, StringRecord, StringRecordsIntoIter, Writer, WriterBuilder};

use crate::control::Control;
use crate::error::QtlError::{MalformedRowError, MissingColumnError};
use crate::safe::ScopedOutput;

/// A row of the phenotype file. The header occupies the first stream position but is not an
/// individual. `line` is the line number in the file, comment lines included.
#[derive(Debug, Clone, PartialEq)]
pub enum PhenoRow {
    Header { line: u64, cells: Vec<String> },
    Individual { line: u64, cells: Vec<String> },
}

impl PhenoRow {
    pub fn cells(&self) -> &[String] {
        match self {
            Self::Header { cells, .. } | Self::Individual { cells, .. } => cells,
        }
    }

    pub fn line(&self) -> u64 {
        match self {
            Self::Header { line, .. } | Self::Individual { line, .. } => *line,
        }
    }

    /// Individual ID, or the name of the ID column for the header
    pub fn id(&self) -> &str {
        self.cells().first().map(String::as_str).unwrap_or_default()
    }

    pub fn get(&self, column: usize) -> Option<&str> {
        self.cells().get(column).map(String::as_str)
    }

    pub fn is_header(&self) -> bool {
        matches!(self, Self::Header { .. })
    }
}

/// Genotype calls of a single marker, one call per individual in phenotype row order.
#[derive(Debug, Clone, PartialEq)]
pub struct GenoRecord {
    pub marker: String,
    pub calls: Vec<String>,
}

/// Records of a delimited file paired with their line numbers.
///
/// Comment lines are skipped here and not by the csv reader, which would otherwise report the
/// position of the first skipped comment for the record after it.
struct Records {
    records: StringRecordsIntoIter<Box<dyn io::Read>>,
    path: PathBuf,
    comment: Option<u8>,
}

impl Records {
    fn open(path: &Path, control: &Control) -> Result<Self> {
        let input = get_input(Some(path.to_path_buf()))?;
        let rdr = get_tsv_reader(input, control.sep_byte()?);
        Ok(Self {
            records: rdr.into_records(),
            path: path.to_path_buf(),
            comment: control.comment_byte(),
        })
    }

    fn malformed(&self, line: u64) -> Report {
        eyre!(MalformedRowError((self.path.display().to_string(), line)))
    }
}

impl Iterator for Records {
    type Item = Result<(u64, StringRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(r) => r,
                Err(e) => return Some(Err(e).wrap_err_with(|| format!("Error reading {:?}", self.path))),
            };

            let is_comment = match (self.comment, record.get(0)) {
                (Some(c), Some(first)) => first.as_bytes().first() == Some(&c),
                _ => false,
            };
            if !is_comment {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                return Some(Ok((line, record)));
            }
        }
    }
}

pub struct PhenoIter {
    records: Records,
    header: bool,
    width: Option<usize>,
    n: usize,
}

impl Iterator for PhenoIter {
    type Item = Result<PhenoRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let (line, record) = match self.records.next()? {
            Ok(r) => r,
            Err(e) => return Some(Err(e)),
        };

        match self.width {
            Some(width) if width != record.len() => return Some(Err(self.records.malformed(line))),
            Some(_) => (),
            None => self.width = Some(record.len()),
        }

        let cells: Vec<String> = record.iter().map(String::from).collect();
        let row = match self.header && self.n == 0 {
            true => PhenoRow::Header { line, cells },
            false => PhenoRow::Individual { line, cells },
        };
        self.n += 1;
        Some(Ok(row))
    }
}

pub struct GenoIter {
    records: Records,
    compact: bool,
    skip_header: bool,
    width: Option<usize>,
}

impl GenoIter {
    fn parse(&mut self, line: u64, record: &StringRecord) -> Result<GenoRecord> {
        let mut fields = record.iter();
        let marker = fields
            .next()
            .ok_or_else(|| eyre!(MissingColumnError((0, line))))?
            .to_string();

        let calls: Vec<String> = match self.compact {
            true => {
                if record.len() != 2 {
                    return Err(self.records.malformed(line));
                }
                record[1].chars().map(String::from).collect()
            }
            false => fields.map(String::from).collect(),
        };

        match self.width {
            Some(width) if width != calls.len() => return Err(self.records.malformed(line)),
            Some(_) => (),
            None => self.width = Some(calls.len()),
        }

        Ok(GenoRecord { marker, calls })
    }
}

impl Iterator for GenoIter {
    type Item = Result<GenoRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let (mut line, mut record) = match self.records.next()? {
            Ok(r) => r,
            Err(e) => return Some(Err(e)),
        };

        if self.skip_header {
            self.skip_header = false;
            // The ids of a compact header fix the number of calls in every row
            if self.compact {
                self.width = Some(record.len().saturating_sub(1));
            }
            (line, record) = match self.records.next()? {
                Ok(r) => r,
                Err(e) => return Some(Err(e)),
            };
        }

        Some(self.parse(line, &record))
    }
}

/// Stream the rows of a phenotype file. Every call starts again from the first line.
///
/// With `header` the first row is returned as [`PhenoRow::Header`]. All rows must have as many
/// fields as the first one.
pub fn iter_pheno(path: &Path, header: bool, control: &Control) -> Result<PhenoIter> {
    Ok(PhenoIter {
        records: Records::open(path, control)?,
        header,
        width: None,
        n: 0,
    })
}

/// Stream `(marker, calls)` records of a genotype file, one marker per line.
///
/// The layout follows the control: compact files store all calls of a marker as one string of
/// single character calls. With `header` the first line is skipped, for compact files its id
/// count is the number of calls every row must have.
pub fn iter_geno(path: &Path, header: bool, control: &Control) -> Result<GenoIter> {
    Ok(GenoIter {
        records: Records::open(path, control)?,
        compact: control.geno_compact,
        skip_header: header,
        width: None,
    })
}

/// Widths are checked by the callers, a compact genotype file has a wide header over two column
/// rows. Fields are never quoted so every record is one line.
pub fn get_tsv_reader<R: io::Read>(input: R, delimiter: u8) -> Reader<R> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(input)
}

pub fn get_tsv_writer<W: io::Write>(output: W) -> Writer<W> {
    WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .double_quote(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(output)
}

pub fn open_tsv_writer(target: &Path) -> Result<Writer<ScopedOutput>> {
    Ok(get_tsv_writer(ScopedOutput::create(target)?))
}

/// Flush a writer opened with [`open_tsv_writer`], the returned output still has to be committed.
pub fn finish_tsv_writer(writer: Writer<ScopedOutput>) -> Result<ScopedOutput> {
    writer
        .into_inner()
        .map_err(|e| eyre!("Error flushing output: {}", e.error()))
}

pub fn get_input(filename: Option<PathBuf>) -> Result<Box<dyn io::Read>> {
    let input: Box<dyn io::Read> = match filename {
        Some(name) => match name.to_str() {
            Some("-") => Box::new(io::stdin()),
            Some(name) => {
                let r = match niffler::from_path(name) {
                    Ok(x) => x.0,
                    Err(err) => {
                        let msg = format!("failed to open \"{name}\": {err}");
                        return Err(eyre!(msg));
                    }
                };
                Box::new(r)
            }
            None => return Err(eyre!("Unknown I/O error")),
        },
        None => Box::new(io::stdin()),
    };
    Ok(input)
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;

    use std::io::Write;

    use crate::error::QtlError;

    fn control(dir: &Path, compact: bool) -> Control {
        let mut control: Control = serde_json::from_str(r#"{"pheno": "pheno.tsv", "geno": "geno.tsv"}"#).unwrap();
        control.path = dir.join("control.json");
        control.geno_compact = compact;
        control
    }

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_iter_pheno() {
        let dir = tempfile::tempdir().unwrap();
        let ctrl = control(dir.path(), false);
        let path = write_file(dir.path(), "pheno.tsv", "id\tbw\n# comment\nind1\t1.5\nind2\tNA\n");

        let rows: Vec<PhenoRow> = iter_pheno(&path, true, &ctrl).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_header());
        assert_eq!(rows[0].get(1), Some("bw"));
        assert_eq!(rows[1].id(), "ind1");
        assert_eq!(rows[2].get(1), Some("NA"));
        assert_eq!(rows[2].get(2), None);

        // Restarts from the first line
        let again = iter_pheno(&path, true, &ctrl).unwrap().next().unwrap().unwrap();
        assert_eq!(again, rows[0]);

        let rows: Vec<PhenoRow> = iter_pheno(&path, false, &ctrl).unwrap().collect::<Result<_>>().unwrap();
        assert!(!rows[0].is_header());
    }

    #[test]
    fn test_iter_pheno_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let ctrl = control(dir.path(), false);
        let path = write_file(dir.path(), "pheno.tsv", "id\tbw\nind1\t1.5\t3\n");

        let res: Result<Vec<PhenoRow>> = iter_pheno(&path, true, &ctrl).unwrap().collect();
        let err = res.unwrap_err();
        assert!(matches!(err.downcast_ref::<QtlError>(), Some(MalformedRowError((_, 2)))));
    }

    #[test]
    fn test_iter_geno() {
        let dir = tempfile::tempdir().unwrap();
        let ctrl = control(dir.path(), false);
        let path = write_file(dir.path(), "geno.tsv", "rs1\tA\tB\tH\nrs2\tB\t-\tB\n");

        let records: Vec<GenoRecord> = iter_geno(&path, false, &ctrl).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(records[0].marker, "rs1");
        assert_eq!(records[0].calls, vec!["A", "B", "H"]);
        assert_eq!(records[1].calls, vec!["B", "-", "B"]);

        let records: Vec<GenoRecord> = iter_geno(&path, true, &ctrl).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].marker, "rs2");
    }

    #[test]
    fn test_iter_geno_compact() {
        let dir = tempfile::tempdir().unwrap();
        let ctrl = control(dir.path(), true);
        let path = write_file(dir.path(), "geno.txt", "marker\tind1\tind2\tind3\nrs1\tABH\nrs2\tBB-\n");

        let records: Vec<GenoRecord> = iter_geno(&path, true, &ctrl).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].calls, vec!["A", "B", "H"]);
        assert_eq!(records[1].calls, vec!["B", "B", "-"]);

        let path = write_file(dir.path(), "bad.txt", "marker\tind1\tind2\tind3\nrs1\tABH\nrs2\tBB\n");
        let res: Result<Vec<GenoRecord>> = iter_geno(&path, true, &ctrl).unwrap().collect();
        assert!(res.is_err());
    }

    #[test]
    fn test_iter_geno_compact_checks_header_ids() {
        let dir = tempfile::tempdir().unwrap();
        let ctrl = control(dir.path(), true);
        let path = write_file(dir.path(), "geno.txt", "marker\tind1\tind2\tind3\nrs1\tABAB\nrs2\tBAAB\n");

        let res: Result<Vec<GenoRecord>> = iter_geno(&path, true, &ctrl).unwrap().collect();
        let err = res.unwrap_err();
        assert!(matches!(err.downcast_ref::<QtlError>(), Some(MalformedRowError((_, 2)))));
    }

    #[test]
    fn test_pheno_line_counts_comments() {
        let dir = tempfile::tempdir().unwrap();
        let ctrl = control(dir.path(), false);
        let path = write_file(dir.path(), "pheno.tsv", "# exported\nid\tbw\n# comment\nind1\t1.5\n");

        let rows: Vec<PhenoRow> = iter_pheno(&path, true, &ctrl).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(rows[0].line(), 2);
        assert_eq!(rows[1].line(), 4);
    }

    #[test]
    fn test_iter_geno_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let ctrl = control(dir.path(), false);
        let path = write_file(dir.path(), "geno.tsv", "rs1\tA\tB\tH\nrs2\tB\tB\n");

        let res: Result<Vec<GenoRecord>> = iter_geno(&path, false, &ctrl).unwrap().collect();
        let err = res.unwrap_err();
        assert!(matches!(err.downcast_ref::<QtlError>(), Some(MalformedRowError((_, 2)))));
    }

    #[test]
    fn test_iter_geno_malformed_after_comment() {
        let dir = tempfile::tempdir().unwrap();
        let ctrl = control(dir.path(), false);
        let path = write_file(dir.path(), "geno.tsv", "# markers\nrs1\tA\tB\n# chr 2\nrs2\tB\n");

        let res: Result<Vec<GenoRecord>> = iter_geno(&path, false, &ctrl).unwrap().collect();
        let err = res.unwrap_err();
        assert!(matches!(err.downcast_ref::<QtlError>(), Some(MalformedRowError((_, 4)))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctrl = control(dir.path(), false);
        assert!(iter_pheno(&dir.path().join("nope.tsv"), true, &ctrl).is_err());
    }
}
