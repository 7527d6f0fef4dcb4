//! Merged-region lookup
//!
//! Maps every cell covered by a merged rectangle to the rectangle's
//! canonical (top-left) cell and its `A1:C2` range string.

use super::address::{parse_address, CellAddress, MAX_COLUMN, MAX_ROW};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Bounds of a merged rectangle as reported by a workbook reader.
///
/// Any bound may be missing when the source is malformed; such entries are
/// skipped when the index is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeBounds {
    pub min_row: Option<u32>,
    pub min_col: Option<u32>,
    pub max_row: Option<u32>,
    pub max_col: Option<u32>,
}

impl MergeBounds {
    pub fn new(min_row: u32, min_col: u32, max_row: u32, max_col: u32) -> Self {
        Self {
            min_row: Some(min_row),
            min_col: Some(min_col),
            max_row: Some(max_row),
            max_col: Some(max_col),
        }
    }

    /// Bounds from a range string such as "A4:E4" (a lone "A4" is a 1x1 region).
    /// Unparseable halves leave the corresponding bounds empty.
    pub fn from_range(range: &str) -> Self {
        let (start, end) = range.split_once(':').unwrap_or((range, range));
        let start = parse_address(start).ok();
        let end = parse_address(end).ok();
        Self {
            min_row: start.map(|(r, _)| r),
            min_col: start.map(|(_, c)| c),
            max_row: end.map(|(r, _)| r),
            max_col: end.map(|(_, c)| c),
        }
    }

    fn region(&self) -> Option<MergedRegion> {
        let region = MergedRegion {
            min_row: self.min_row?,
            min_col: self.min_col?,
            max_row: self.max_row?,
            max_col: self.max_col?,
        };
        let valid = region.min_row >= 1
            && region.min_col >= 1
            && region.min_row <= region.max_row
            && region.min_col <= region.max_col;
        valid.then_some(region)
    }
}

/// A well-formed merged rectangle (1-based, inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedRegion {
    pub min_row: u32,
    pub min_col: u32,
    pub max_row: u32,
    pub max_col: u32,
}

/// Where a covered cell's value actually lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTarget {
    pub canonical: CellAddress,
    pub range: String,
}

/// Covered cell → (canonical cell, range string).
///
/// When regions overlap, the first region declared keeps the shared cells.
#[derive(Debug, Clone, Default)]
pub struct MergedRegionIndex {
    targets: HashMap<CellAddress, MergeTarget>,
    skipped_regions: usize,
}

impl MergedRegionIndex {
    pub fn build<I>(regions: I) -> Self
    where
        I: IntoIterator<Item = MergeBounds>,
    {
        let mut index = Self::default();

        for bounds in regions {
            let Some(region) = bounds.region() else {
                warn!(?bounds, "Skipping malformed merged region");
                index.skipped_regions += 1;
                continue;
            };

            // A region whose top-left cell is outside the sheet has no cell to redirect to
            let Ok(canonical) = CellAddress::new(region.min_row, region.min_col) else {
                warn!(?region, "Skipping merged region outside sheet limits");
                index.skipped_regions += 1;
                continue;
            };
            let bottom_right = CellAddress::new(
                region.max_row.min(MAX_ROW),
                region.max_col.min(MAX_COLUMN),
            )
            .unwrap_or(canonical);
            let range = format!("{}:{}", canonical, bottom_right);

            // Cells past the sheet limits cannot be addressed; the rest of the region still counts
            for row in region.min_row..=region.max_row.min(MAX_ROW) {
                for col in region.min_col..=region.max_col.min(MAX_COLUMN) {
                    let Ok(cell) = CellAddress::new(row, col) else {
                        debug!(row, col, "Skipping unencodable merged cell");
                        continue;
                    };
                    index.targets.entry(cell).or_insert_with(|| MergeTarget {
                        canonical,
                        range: range.clone(),
                    });
                }
            }
        }

        index
    }

    pub fn get(&self, cell: &CellAddress) -> Option<&MergeTarget> {
        self.targets.get(cell)
    }

    /// Lookup by address string; malformed strings are simply not covered
    pub fn lookup(&self, address: &str) -> Option<&MergeTarget> {
        let cell = CellAddress::parse(address).ok()?;
        self.targets.get(&cell)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Number of source regions dropped as malformed
    pub fn skipped_regions(&self) -> usize {
        self.skipped_regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[test]
    fn test_single_row_region_maps_every_cell() {
        let index = MergedRegionIndex::build([MergeBounds::new(2, 1, 2, 3)]);

        assert_eq!(index.len(), 3);
        for address in ["A2", "B2", "C2"] {
            let target = index.lookup(address).unwrap();
            assert_eq!(target.canonical, cell("A2"));
            assert_eq!(target.range, "A2:C2");
        }
        assert!(index.lookup("D2").is_none());
        assert!(index.lookup("A3").is_none());
    }

    #[test]
    fn test_block_region() {
        let index = MergedRegionIndex::build([MergeBounds::from_range("B3:C5")]);
        assert_eq!(index.len(), 6);
        assert_eq!(index.lookup("C5").unwrap().canonical, cell("B3"));
        assert_eq!(index.lookup("C5").unwrap().range, "B3:C5");
        assert_eq!(index.get(&cell("B3")).unwrap().canonical, cell("B3"));
    }

    #[test]
    fn test_malformed_regions_are_skipped() {
        let index = MergedRegionIndex::build([
            MergeBounds {
                min_row: None,
                ..MergeBounds::new(1, 1, 1, 2)
            },
            MergeBounds::new(3, 3, 2, 3),
            MergeBounds::from_range("garbage"),
            MergeBounds::new(4, 1, 4, 5),
        ]);

        assert_eq!(index.skipped_regions(), 3);
        assert_eq!(index.len(), 5);
        assert_eq!(index.lookup("E4").unwrap().range, "A4:E4");
    }

    #[test]
    fn test_overlap_first_declared_wins() {
        let index = MergedRegionIndex::build([
            MergeBounds::from_range("A1:B2"),
            MergeBounds::from_range("B2:C3"),
        ]);

        assert_eq!(index.lookup("B2").unwrap().canonical, cell("A1"));
        assert_eq!(index.lookup("C3").unwrap().canonical, cell("B2"));
    }

    #[test]
    fn test_cells_beyond_column_limit_are_skipped_individually() {
        let index = MergedRegionIndex::build([MergeBounds::new(1, 16_383, 1, 16_386)]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("XFD1").unwrap().range, "XFC1:XFD1");
    }

    #[test]
    fn test_from_range_single_cell() {
        let bounds = MergeBounds::from_range("D7");
        assert_eq!(bounds, MergeBounds::new(7, 4, 7, 4));
    }

    #[test]
    fn test_lookup_malformed_address() {
        let index = MergedRegionIndex::build([MergeBounds::new(1, 1, 1, 2)]);
        assert!(index.lookup("not-a-cell").is_none());
    }
}
