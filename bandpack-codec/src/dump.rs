//! Band diagnostics
//!
//! Two debugging aids: per-band dump files written next to an archive, and a
//! JSON-friendly [`BandReport`] summarizing every band in a tree.

use crate::phase::Phase;
use crate::tree::{BandKind, BandTree, MultiBandId};
use bandpack_format::Result;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name stem for a band dump: four-digit sequence number plus the band
/// name with punctuation flattened to underscores.
pub fn dump_file_name(name: &str, seq: usize) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '(' | ')' | '/' | '*') { ' ' } else { c })
        .collect();
    let cleaned = cleaned.trim().replace(' ', "_");
    let numbered = format!("{}_{}", 10000 + seq, cleaned);
    numbered[1..].to_string()
}

/// Header line of a value band's `.txt` dump.
pub fn dump_header(len: usize, size: usize, irregular: bool, coding: &str, meta: &[u8]) -> String {
    let mut line = format!("# length={} size={}", len, size);
    if irregular {
        line.push_str(" irregular");
    }
    let _ = write!(line, " coding={}", coding);
    if !meta.is_empty() {
        line.push_str(" //header:");
        for (i, b) in meta.iter().enumerate() {
            if i == 1 {
                line.push_str(" /");
            }
            let _ = write!(line, " {}", b);
        }
    }
    line
}

/// Writes band dumps into one directory.
#[derive(Debug, Clone)]
pub struct BandDumper {
    dir: PathBuf,
}

impl BandDumper {
    /// Dump into `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::info!(dir = %dir.display(), "dumping bands");
        Ok(Self { dir })
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn create(&self, name: &str, seq: usize, ext: &str) -> Result<BufWriter<File>> {
        let path = self.dir.join(format!("{}{}", dump_file_name(name, seq), ext));
        tracing::debug!(band = name, path = %path.display(), "dumping band");
        Ok(BufWriter::new(File::create(path)?))
    }

    /// Write `.txt` (header and values, ten per line) and `.bnd` (encoded
    /// bytes) for a value band.
    pub fn dump_values(&self, name: &str, seq: usize, header: &str, values: &[i32], encoded: &[u8]) -> Result<()> {
        let mut txt = self.create(name, seq, ".txt")?;
        txt.write_all(header.as_bytes())?;
        for (i, v) in values.iter().enumerate() {
            if i % 10 == 0 {
                writeln!(txt)?;
            } else {
                write!(txt, " ")?;
            }
            write!(txt, "{}", v)?;
        }
        writeln!(txt)?;
        txt.flush()?;
        self.dump_bytes(name, seq, encoded)
    }

    /// Write the `.bnd` file for a band.
    pub fn dump_bytes(&self, name: &str, seq: usize, bytes: &[u8]) -> Result<()> {
        let mut bnd = self.create(name, seq, ".bnd")?;
        bnd.write_all(bytes)?;
        bnd.flush()?;
        Ok(())
    }
}

/// Summary of one band.
#[derive(Debug, Clone, Serialize)]
pub struct BandSummary {
    /// Band name.
    pub name: String,
    /// Declaration sequence number, starting at 1.
    pub seq: usize,
    /// `"value"`, `"byte"` or `"multi"`.
    pub kind: &'static str,
    /// Current phase.
    pub phase: Phase,
    /// Values or bytes held.
    pub len: usize,
    /// Values announced on the read side.
    pub expected: usize,
    /// Declared regular coding.
    pub regular: String,
    /// Coding actually used, once chosen or read.
    pub coding: Option<String>,
    /// Meta-coding bytes.
    pub meta: Vec<u8>,
    /// Encoded size, if known.
    pub output_size: Option<usize>,
}

/// Summary of a band tree, in wire order.
#[derive(Debug, Clone, Serialize)]
pub struct BandReport {
    /// One entry per band, aggregates included.
    pub bands: Vec<BandSummary>,
}

impl BandReport {
    /// Summarize every band under `root`.
    pub fn collect(tree: &BandTree, root: MultiBandId) -> Self {
        let mut bands = Vec::new();
        let mut stack = vec![root.id()];
        while let Some(id) = stack.pop() {
            let node = tree.node(id);
            let (kind, coding, meta, output_size) = match &node.kind {
                BandKind::Value(v) => (
                    "value",
                    v.coding.as_ref().map(|c| c.to_string()),
                    v.meta.to_vec(),
                    v.output_size,
                ),
                BandKind::Byte(b) => ("byte", None, Vec::new(), Some(b.bytes.len())),
                BandKind::Multi(m) => {
                    stack.extend(m.children.iter().rev());
                    ("multi", None, Vec::new(), None)
                }
            };
            bands.push(BandSummary {
                name: node.name.clone(),
                seq: node.seq,
                kind,
                phase: node.phase,
                len: node.len(),
                expected: node.expected,
                regular: node.regular.to_string(),
                coding,
                meta,
                output_size,
            });
        }
        Self { bands }
    }

    /// Total encoded size of the bands whose size is known.
    pub fn total_output_size(&self) -> usize {
        self.bands.iter().filter_map(|b| b.output_size).sum()
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_file_name() {
        assert_eq!(dump_file_name("cp_Utf8_chars", 7), "0007_cp_Utf8_chars");
        assert_eq!(dump_file_name("(constant_pool)", 12), "0012_constant_pool");
        assert_eq!(dump_file_name("a/b*c", 3), "0003_a_b_c");
    }

    #[test]
    fn test_dump_header() {
        assert_eq!(dump_header(3, 3, false, "(5,64)", &[]), "# length=3 size=3 coding=(5,64)");
        assert_eq!(
            dump_header(2, 9, true, "Run", &[117, 3, 0]),
            "# length=2 size=9 irregular coding=Run //header: 117 / 3 0"
        );
    }

    #[test]
    fn test_dump_files() {
        let dir = tempfile::tempdir().unwrap();
        let dumper = BandDumper::new(dir.path()).unwrap();
        let values: Vec<i32> = (0..12).collect();
        dumper
            .dump_values("bc_label", 5, "# length=12", &values, &[1, 2])
            .unwrap();
        let txt = fs::read_to_string(dir.path().join("0005_bc_label.txt")).unwrap();
        assert_eq!(txt, "# length=12\n0 1 2 3 4 5 6 7 8 9\n10 11\n");
        let bnd = fs::read(dir.path().join("0005_bc_label.bnd")).unwrap();
        assert_eq!(bnd, vec![1, 2]);
    }
}
