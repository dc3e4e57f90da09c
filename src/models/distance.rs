// Rack-to-rack travel distances

use crate::models::{Cost, RackId};
use serde::{Deserialize, Serialize};

/// Square `n x n` matrix of non-negative travel costs between racks.
///
/// The matrix need not be symmetric: `get(i, j)` is the cost of walking from
/// rack `i` to rack `j`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    size: usize,
    values: Vec<Cost>,
}

impl DistanceMatrix {
    /// Builds a matrix from its rows. Returns `None` if the rows are not square.
    pub fn from_rows(rows: Vec<Vec<Cost>>) -> Option<Self> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return None;
        }
        Some(Self {
            size,
            values: rows.into_iter().flatten().collect(),
        })
    }

    /// Builds a symmetric matrix where the distance is `|i - j| * step`,
    /// i.e. racks laid out on a line
    pub fn linear(size: usize, step: Cost) -> Self {
        let mut values = Vec::with_capacity(size * size);
        for i in 0..size {
            for j in 0..size {
                values.push(i.abs_diff(j) as Cost * step);
            }
        }
        Self { size, values }
    }

    /// Number of racks covered by the matrix
    pub fn size(&self) -> usize {
        self.size
    }

    /// Travel cost from rack `from` to rack `to`
    #[inline]
    pub fn get(&self, from: RackId, to: RackId) -> Cost {
        self.values[from * self.size + to]
    }

    /// Iterates over the rows of the matrix
    pub fn rows(&self) -> impl Iterator<Item = &[Cost]> {
        self.values.chunks(self.size.max(1))
    }

    /// Checks whether `get(i, j) == get(j, i)` for every pair
    pub fn is_symmetric(&self) -> bool {
        (0..self.size).all(|i| (i + 1..self.size).all(|j| self.get(i, j) == self.get(j, i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let matrix = DistanceMatrix::from_rows(vec![vec![0, 3], vec![4, 0]]).unwrap();
        assert_eq!(matrix.size(), 2);
        assert_eq!(matrix.get(0, 1), 3);
        assert_eq!(matrix.get(1, 0), 4);
        assert!(!matrix.is_symmetric());
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        assert!(DistanceMatrix::from_rows(vec![vec![0, 1], vec![1]]).is_none());
    }

    #[test]
    fn test_linear() {
        let matrix = DistanceMatrix::linear(4, 2);
        assert_eq!(matrix.get(0, 3), 6);
        assert_eq!(matrix.get(3, 1), 4);
        assert!(matrix.is_symmetric());
        assert_eq!(matrix.rows().count(), 4);
    }
}
