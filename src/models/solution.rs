// Solution model: one rack per product plus the producing solver's objective

use crate::models::RackId;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading or writing a persisted solution
#[derive(Debug, Error)]
pub enum SolutionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to access {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("solution file is empty")]
    Empty,

    #[error("line {line}: expected an integer, found {content:?}")]
    Parse { line: usize, content: String },

    /// Well-formed line naming a rack below zero
    #[error("line {line}: product {product} has negative rack {rack}")]
    NegativeRack {
        line: usize,
        product: usize,
        rack: i64,
    },

    #[error("file declares {declared} products but contains {actual} rack lines")]
    CountMismatch { declared: usize, actual: usize },
}

/// What the `objective` field of a solution measures.
///
/// The greedy solver reports the number of placed products and the exact
/// path reports total travel cost; the two must never be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveKind {
    PlacedProducts,
    TravelCost,
    /// Read back from storage, which only keeps positions
    Unknown,
}

/// Assignment of every product to a rack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// `positions[k]` is the rack of product `k`
    pub positions: Vec<RackId>,

    pub objective: u64,

    pub objective_kind: ObjectiveKind,
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl Solution {
    /// Creates an empty solution
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            objective: 0,
            objective_kind: ObjectiveKind::Unknown,
        }
    }

    /// Creates a populated solution
    pub fn with_positions(
        positions: Vec<RackId>,
        objective: u64,
        objective_kind: ObjectiveKind,
    ) -> Self {
        Self {
            positions,
            objective,
            objective_kind,
        }
    }

    pub fn num_products(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of products per rack. Positions outside `0..num_racks` are ignored.
    pub fn occupancy(&self, num_racks: usize) -> Vec<u32> {
        let mut count = vec![0u32; num_racks];
        for &rack in &self.positions {
            if let Some(slot) = count.get_mut(rack) {
                *slot += 1;
            }
        }
        count
    }

    /// Writes the solution in the persisted text format: the product count,
    /// then one rack id per line in product order
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), SolutionError> {
        writeln!(writer, "{}", self.positions.len())?;
        for rack in &self.positions {
            writeln!(writer, "{}", rack)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads a solution in the persisted text format. Blank lines are skipped.
    pub fn read_from<R: BufRead>(reader: R) -> Result<Self, SolutionError> {
        let mut lines = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                lines.push((index + 1, trimmed.to_string()));
            }
        }

        let ((_, header), body) = lines.split_first().ok_or(SolutionError::Empty)?;
        let declared = parse_count(lines[0].0, header)?;
        if body.len() != declared {
            return Err(SolutionError::CountMismatch {
                declared,
                actual: body.len(),
            });
        }

        let positions = body
            .iter()
            .enumerate()
            .map(|(product, (line, content))| parse_rack(*line, product, content))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::with_positions(positions, 0, ObjectiveKind::Unknown))
    }

    /// Saves the solution to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SolutionError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| SolutionError::File {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_to(BufWriter::new(file))
    }

    /// Loads a solution from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SolutionError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SolutionError::File {
            path: path.to_path_buf(),
            source,
        })?;
        Self::read_from(BufReader::new(file))
    }

    /// Deterministic identifier derived from the positions (12 hex chars of
    /// a blake3 digest), for callers without their own id scheme
    pub fn content_id(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for rack in &self.positions {
            hasher.update(&(*rack as u64).to_le_bytes());
        }
        hasher.finalize().to_hex()[..12].to_string()
    }
}

fn parse_integer(line: usize, content: &str) -> Result<i64, SolutionError> {
    content.parse::<i64>().map_err(|_| SolutionError::Parse {
        line,
        content: content.to_string(),
    })
}

fn parse_count(line: usize, content: &str) -> Result<usize, SolutionError> {
    usize::try_from(parse_integer(line, content)?).map_err(|_| SolutionError::Parse {
        line,
        content: content.to_string(),
    })
}

fn parse_rack(line: usize, product: usize, content: &str) -> Result<RackId, SolutionError> {
    let rack = parse_integer(line, content)?;
    RackId::try_from(rack).map_err(|_| SolutionError::NegativeRack {
        line,
        product,
        rack,
    })
}

/// File name of a persisted solution: `{instance}_{algorithm}_{id}.sol`
pub fn solution_file_name(instance: &str, algorithm: &str, id: &str) -> String {
    format!("{}_{}_{}.sol", instance, algorithm, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_occupancy() {
        let solution = Solution::with_positions(vec![0, 0, 2, 9], 4, ObjectiveKind::PlacedProducts);
        assert_eq!(solution.occupancy(3), vec![2, 0, 1]);
    }

    #[test]
    fn test_write_format() {
        let solution = Solution::with_positions(vec![1, 0, 1], 3, ObjectiveKind::PlacedProducts);
        let mut buffer = Vec::new();
        solution.write_to(&mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "3\n1\n0\n1\n");
    }

    #[test]
    fn test_read_skips_blank_lines() {
        let solution = Solution::read_from(Cursor::new("2\n\n4\n  5 \n\n")).unwrap();
        assert_eq!(solution.positions, vec![4, 5]);
        assert_eq!(solution.objective_kind, ObjectiveKind::Unknown);
    }

    #[test]
    fn test_read_rejects_count_mismatch() {
        let err = Solution::read_from(Cursor::new("3\n1\n2\n")).unwrap_err();
        assert!(matches!(
            err,
            SolutionError::CountMismatch {
                declared: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_read_rejects_garbage() {
        let err = Solution::read_from(Cursor::new("1\nabc\n")).unwrap_err();
        assert!(matches!(err, SolutionError::Parse { line: 2, .. }));
        assert!(matches!(
            Solution::read_from(Cursor::new("")).unwrap_err(),
            SolutionError::Empty
        ));
    }

    #[test]
    fn test_read_reports_negative_rack() {
        let err = Solution::read_from(Cursor::new("2\n0\n-1\n")).unwrap_err();
        assert!(matches!(
            err,
            SolutionError::NegativeRack {
                line: 3,
                product: 1,
                rack: -1
            }
        ));
        // A negative count is malformed, not a rack
        assert!(matches!(
            Solution::read_from(Cursor::new("-1\n")).unwrap_err(),
            SolutionError::Parse { line: 1, .. }
        ));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!(
            "slotting_solution_{}_{}.sol",
            std::process::id(),
            "save_load"
        ));
        let solution = Solution::with_positions(vec![3, 1, 4, 1, 5], 5, ObjectiveKind::PlacedProducts);
        solution.save(&path).unwrap();
        let loaded = Solution::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.positions, solution.positions);
    }

    #[test]
    fn test_content_id_is_deterministic() {
        let a = Solution::with_positions(vec![1, 2, 3], 0, ObjectiveKind::Unknown);
        let b = Solution::with_positions(vec![1, 2, 3], 9, ObjectiveKind::TravelCost);
        let c = Solution::with_positions(vec![3, 2, 1], 0, ObjectiveKind::Unknown);
        assert_eq!(a.content_id(), b.content_id());
        assert_ne!(a.content_id(), c.content_id());
        assert_eq!(a.content_id().len(), 12);
    }

    #[test]
    fn test_solution_file_name() {
        assert_eq!(
            solution_file_name("wh01", "greedy", "abc"),
            "wh01_greedy_abc.sol"
        );
    }
}
