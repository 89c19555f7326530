use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use crate::safe::ScopedOutput;

/// R/qtl2 style control file describing which files make up a dataset and how to read them.
///
/// File paths are relative to the directory of the control file itself. A loaded control is
/// never modified in place, filtering derives a new one with [`Control::filtered`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crosstype: Option<String>,
    #[serde(default = "default_sep")]
    pub sep: String,
    #[serde(default = "default_na_strings")]
    pub na_strings: Vec<String>,
    #[serde(default = "default_comment_char")]
    pub comment_char: String,
    pub pheno: PathBuf,
    pub geno: PathBuf,
    #[serde(default)]
    pub gmap: Option<PathBuf>,
    #[serde(default)]
    pub phenotypes: Option<usize>,
    #[serde(default)]
    pub individuals: Option<usize>,
    #[serde(default)]
    pub markers: Option<usize>,
    #[serde(default)]
    pub maf: Option<f64>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alleles: Option<Vec<String>>,
    #[serde(default = "default_genotypes")]
    pub genotypes: BTreeMap<String, i64>,
    #[serde(default)]
    pub geno_compact: bool,
    #[serde(default)]
    pub geno_transposed: bool,

    /// Keys this program does not interpret, kept as they are
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,

    /// Where the control was read from or last written to
    #[serde(skip)]
    pub path: PathBuf,
}

fn default_sep() -> String {
    String::from("\t")
}

fn default_na_strings() -> Vec<String> {
    vec![String::from("-"), String::from("NA")]
}

fn default_comment_char() -> String {
    String::from("#")
}

fn default_genotypes() -> BTreeMap<String, i64> {
    [("A", 1), ("H", 2), ("B", 3)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Counts and locations produced by the filter pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub pheno: PathBuf,
    pub geno: PathBuf,
    pub individuals: usize,
    pub markers: usize,
    pub maf: f64,
}

impl Control {
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            std::fs::File::open(path).wrap_err(eyre!("Error opening control file {path:?}"))?;
        let mut control: Control = serde_json::from_reader(std::io::BufReader::new(file))
            .wrap_err(eyre!("Error parsing control file {path:?}"))?;
        control.path = path.to_path_buf();
        Ok(control)
    }

    /// Serialize the control atomically, the target only appears once it is complete.
    pub fn write(&self, path: &Path) -> Result<()> {
        self.to_output(path)?.commit()?;
        tracing::info!("Wrote control file {path:?}");
        Ok(())
    }

    /// Serialize into an uncommitted output for `path`.
    pub fn to_output(&self, path: &Path) -> Result<ScopedOutput> {
        let mut output = ScopedOutput::create(path)?;
        serde_json::to_writer_pretty(&mut output, self)
            .wrap_err(eyre!("Error serializing control file {path:?}"))?;
        writeln!(output)?;
        Ok(output)
    }

    /// Directory all relative paths of this control resolve against.
    pub fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn resolve(&self, file: &Path) -> PathBuf {
        self.dir().join(file)
    }

    pub fn pheno_path(&self) -> PathBuf {
        self.resolve(&self.pheno)
    }

    pub fn geno_path(&self) -> PathBuf {
        self.resolve(&self.geno)
    }

    pub fn is_missing(&self, value: &str) -> bool {
        self.na_strings.iter().any(|na| na == value)
    }

    pub fn sep_byte(&self) -> Result<u8> {
        match self.sep.as_bytes() {
            [b] => Ok(*b),
            _ => Err(eyre!(
                "Field separator {:?} must be a single byte character",
                self.sep
            )),
        }
    }

    pub fn comment_byte(&self) -> Option<u8> {
        self.comment_char.as_bytes().first().copied()
    }

    /// Derive the control describing a filtered dataset that will be written to `path`.
    ///
    /// Everything not touched by filtering is copied from `self`. `outcome` paths are relative to
    /// the directory of `path`. The marker map is rebased so it still points to the same file.
    pub fn filtered(&self, path: &Path, outcome: FilterOutcome) -> Result<Self> {
        let mut control = self.clone();
        control.path = path.to_path_buf();

        control.command = Some(String::from("filter"));
        control.pheno = outcome.pheno;
        control.geno = outcome.geno;
        control.geno_compact = true;
        control.geno_transposed = true;
        control.individuals = Some(outcome.individuals);
        control.markers = Some(outcome.markers);
        control.maf = Some(outcome.maf);

        if let Some(gmap) = &self.gmap {
            if control.dir() != self.dir() && gmap.is_relative() {
                control.gmap = Some(std::path::absolute(self.resolve(gmap))?);
            }
        }

        Ok(control)
    }
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;

    fn minimal() -> Control {
        let json = r#"{"pheno": "pheno.tsv", "geno": "geno.tsv", "gmap": "gmap.csv", "phenotypes": 2, "x_chr": "X"}"#;
        let mut control: Control = serde_json::from_str(json).unwrap();
        control.path = PathBuf::from("data/set/control.json");
        control
    }

    #[test]
    fn test_defaults() {
        let control = minimal();
        assert_eq!(control.sep, "\t");
        assert_eq!(control.na_strings, vec!["-", "NA"]);
        assert_eq!(control.comment_byte(), Some(b'#'));
        assert_eq!(control.genotypes.get("H"), Some(&2));
        assert!(!control.geno_compact);
        assert!(control.is_missing("NA"));
        assert!(!control.is_missing("1.2"));
        assert_eq!(control.extra.get("x_chr"), Some(&serde_json::json!("X")));
    }

    #[test]
    fn test_paths_resolve_against_control_dir() {
        let control = minimal();
        assert_eq!(control.pheno_path(), PathBuf::from("data/set/pheno.tsv"));
        assert_eq!(control.geno_path(), PathBuf::from("data/set/geno.tsv"));

        let mut control = minimal();
        control.path = PathBuf::from("control.json");
        assert_eq!(control.pheno_path(), PathBuf::from("./pheno.tsv"));
    }

    #[test]
    fn test_filtered_leaves_original_untouched() {
        let control = minimal();
        let outcome = FilterOutcome {
            pheno: PathBuf::from("out_pheno.tsv"),
            geno: PathBuf::from("out_geno.txt"),
            individuals: 3,
            markers: 7,
            maf: 0.1,
        };
        let new = control.filtered(Path::new("data/set/out.json"), outcome).unwrap();

        assert_eq!(control.command, None);
        assert_eq!(control.pheno, PathBuf::from("pheno.tsv"));
        assert_eq!(control.individuals, None);

        assert_eq!(new.command.as_deref(), Some("filter"));
        assert_eq!(new.pheno, PathBuf::from("out_pheno.tsv"));
        assert_eq!(new.geno, PathBuf::from("out_geno.txt"));
        assert!(new.geno_compact);
        assert!(new.geno_transposed);
        assert_eq!(new.individuals, Some(3));
        assert_eq!(new.markers, Some(7));
        assert_eq!(new.maf, Some(0.1));
        assert_eq!(new.phenotypes, Some(2));
        assert_eq!(new.gmap, Some(PathBuf::from("gmap.csv")));
        assert_eq!(new.extra, control.extra);
    }

    #[test]
    fn test_filtered_rebases_gmap() {
        let control = minimal();
        let outcome = FilterOutcome {
            pheno: PathBuf::from("p.tsv"),
            geno: PathBuf::from("g.txt"),
            individuals: 0,
            markers: 0,
            maf: 0.0,
        };
        let new = control.filtered(Path::new("elsewhere/out.json"), outcome).unwrap();
        let gmap = new.gmap.unwrap();
        assert!(gmap.is_absolute());
        assert!(gmap.ends_with("data/set/gmap.csv"));
    }

    #[test]
    fn test_sep_byte() {
        let mut control = minimal();
        assert_eq!(control.sep_byte().unwrap(), b'\t');
        control.sep = String::from(",");
        assert_eq!(control.sep_byte().unwrap(), b',');
        control.sep = String::from(",,");
        assert!(control.sep_byte().is_err());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.json");
        let control = minimal();
        control.write(&path).unwrap();

        let mut loaded = Control::load(&path).unwrap();
        assert_eq!(loaded.path, path);
        loaded.path = control.path.clone();
        assert_eq!(loaded, control);

        // Nothing is left behind next to the control file
        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("copy.json")]);
    }
}
