//! Combination of per-frame backend statistics.

use crate::frame::Stat;
use crate::utils::config::TOTAL_BYTES_STAT;

/// Combine the statistics of an accumulated frame with an incoming one
///
/// Only the total-bytes statistic is carried: summed when both sides report
/// it (unit taken from `dest`), passed through when one side does. Every
/// other statistic is dropped.
pub fn combine_stats(dest: &[Stat], source: &[Stat]) -> Vec<Stat> {
    let dest_stat = find_stat(dest, TOTAL_BYTES_STAT);
    let source_stat = find_stat(source, TOTAL_BYTES_STAT);

    match (dest_stat, source_stat) {
        (Some(d), Some(s)) => vec![Stat {
            display_name: TOTAL_BYTES_STAT.to_string(),
            unit: d.unit.clone(),
            value: d.value + s.value,
        }],
        (Some(only), None) | (None, Some(only)) => vec![only.clone()],
        (None, None) => Vec::new(),
    }
}

/// Find a statistic by display name
pub fn find_stat<'a>(stats: &'a [Stat], display_name: &str) -> Option<&'a Stat> {
    stats.iter().find(|s| s.display_name == display_name)
}
