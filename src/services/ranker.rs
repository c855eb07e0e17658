//! Grouping and ordering of probe results

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::models::{ProbeResult, RankedPlaylist, RankedSection, RetentionPolicy};

/// Group results by category and order each group best-first.
///
/// Sections follow `section_order`, never discovery order, and empty sections
/// are omitted. Within a section results are sorted by ascending latency; ties
/// keep their input position. In [`RetentionPolicy::Inclusive`] mode failures
/// are kept after every success, since their latency is infinite.
pub fn rank(
    results: Vec<ProbeResult>,
    section_order: &[String],
    retention: RetentionPolicy,
) -> RankedPlaylist {
    let index: HashMap<&str, usize> = section_order
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    let mut buckets: Vec<Vec<ProbeResult>> = vec![Vec::new(); section_order.len()];

    let mut discarded = 0usize;
    for result in results {
        if retention == RetentionPolicy::Strict && !result.success() {
            discarded += 1;
            continue;
        }
        match index.get(result.category.as_str()) {
            Some(&i) => buckets[i].push(result),
            None => warn!(
                "Dropping '{}': category '{}' is not part of the output",
                result.entry.name, result.category
            ),
        }
    }

    let sections: Vec<RankedSection> = section_order
        .iter()
        .zip(buckets)
        .filter(|(_, bucket)| !bucket.is_empty())
        .map(|(category, mut bucket)| {
            bucket.sort_by(|a, b| {
                a.latency_millis()
                    .total_cmp(&b.latency_millis())
                    .then(a.position.cmp(&b.position))
            });
            RankedSection {
                category: category.clone(),
                results: bucket,
            }
        })
        .collect();

    debug!(
        "Ranked {} entries into {} sections ({} failed probes discarded)",
        sections.iter().map(|s| s.results.len()).sum::<usize>(),
        sections.len(),
        discarded
    );

    RankedPlaylist { sections }
}
