//! Year to storage partition routing
//!
//! Observations live in fixed, pre-created decade partitions covering
//! `[FIRST_PARTITION_YEAR, END_PARTITION_YEAR)`. The mapping is a pure
//! function of the year; there is no fallback partition.

use std::fmt;

/// First year of the first partition
pub const FIRST_PARTITION_YEAR: i32 = 1800;

/// Exclusive upper bound of the last partition
pub const END_PARTITION_YEAR: i32 = 2110;

/// Width of every partition in years
pub const PARTITION_SPAN: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no partition covers year {0}")]
pub struct NoPartitionForYear(pub i32);

/// A decade partition of the `observations` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition {
    start_year: i32,
}

impl Partition {
    /// Inclusive first year
    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    /// Inclusive last year
    pub fn end_year(&self) -> i32 {
        self.start_year + PARTITION_SPAN - 1
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start_year..=self.end_year()).contains(&year)
    }

    /// Physical table name, e.g. `observations_2020_2029`
    pub fn table_name(&self) -> String {
        format!("observations_{}_{}", self.start_year, self.end_year())
    }

    /// Every partition, oldest first
    pub fn all() -> impl Iterator<Item = Partition> {
        (FIRST_PARTITION_YEAR..END_PARTITION_YEAR)
            .step_by(PARTITION_SPAN as usize)
            .map(|start_year| Partition { start_year })
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_name())
    }
}

/// Route a year to the partition that stores it
pub fn route(year: i32) -> Result<Partition, NoPartitionForYear> {
    if !(FIRST_PARTITION_YEAR..END_PARTITION_YEAR).contains(&year) {
        return Err(NoPartitionForYear(year));
    }
    let offset = (year - FIRST_PARTITION_YEAR) / PARTITION_SPAN;
    Ok(Partition {
        start_year: FIRST_PARTITION_YEAR + offset * PARTITION_SPAN,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_route_decade_boundaries() {
        assert_eq!(route(1900).unwrap().table_name(), "observations_1900_1909");
        assert_eq!(route(1909).unwrap().table_name(), "observations_1900_1909");
        assert_eq!(route(1910).unwrap().table_name(), "observations_1910_1919");
        assert_eq!(route(2020).unwrap().table_name(), "observations_2020_2029");
        assert_eq!(route(2099).unwrap().table_name(), "observations_2090_2099");
        assert_eq!(route(1800).unwrap().table_name(), "observations_1800_1809");
        assert_eq!(route(1850).unwrap().table_name(), "observations_1850_1859");
        assert_eq!(route(2100).unwrap().table_name(), "observations_2100_2109");
    }

    #[test]
    fn test_route_rejects_uncovered_years() {
        assert_eq!(route(1799), Err(NoPartitionForYear(1799)));
        assert_eq!(route(2110), Err(NoPartitionForYear(2110)));
        assert_eq!(route(-1), Err(NoPartitionForYear(-1)));
    }

    #[test]
    fn test_every_covered_year_lands_in_containing_partition() {
        for year in FIRST_PARTITION_YEAR..END_PARTITION_YEAR {
            let partition = route(year).unwrap();
            assert!(partition.contains(year), "{year} routed to {partition}");
            assert_eq!(partition.start_year() % PARTITION_SPAN, 0);
        }
    }

    #[test]
    fn test_partitions_cover_every_normalizable_year() {
        use crate::ingest::normalize::{MAX_YEAR, MIN_YEAR};

        for year in MIN_YEAR..=MAX_YEAR {
            assert!(route(year).is_ok(), "no partition for accepted year {year}");
        }
    }

    #[test]
    fn test_all_partitions_are_contiguous() {
        let partitions: Vec<_> = Partition::all().collect();
        assert_eq!(partitions.len(), 31);
        assert_eq!(partitions[0].start_year(), FIRST_PARTITION_YEAR);
        assert_eq!(partitions[30].end_year(), END_PARTITION_YEAR - 1);
        for pair in partitions.windows(2) {
            assert_eq!(pair[0].end_year() + 1, pair[1].start_year());
        }
    }
}
