//! Reduce catalog leaves to the latest published state of each package

use super::CatalogLeafItem;
use std::collections::HashMap;

/// Keep the latest leaf per package identity and drop deleted packages
///
/// Leaves are grouped by case-insensitive id and normalized version. Within
/// a group the leaf with the greatest commit timestamp wins; on a tie a
/// delete wins over details. Groups whose winner is a delete are dropped.
/// The result is ordered by commit timestamp, then id, then version.
pub fn latest_published(leaves: Vec<CatalogLeafItem>) -> Vec<CatalogLeafItem> {
    let mut latest: HashMap<(String, String), CatalogLeafItem> = HashMap::new();

    for leaf in leaves {
        let key = leaf.identity_key();
        match latest.get(&key) {
            Some(current) if !supersedes(&leaf, current) => {}
            _ => {
                latest.insert(key, leaf);
            }
        }
    }

    let mut published: Vec<((String, String), CatalogLeafItem)> = latest
        .into_iter()
        .filter(|(_, leaf)| !leaf.is_delete())
        .collect();
    published.sort_by(|(a_key, a), (b_key, b)| {
        a.commit_timestamp
            .cmp(&b.commit_timestamp)
            .then_with(|| a_key.cmp(b_key))
    });

    published.into_iter().map(|(_, leaf)| leaf).collect()
}

fn supersedes(candidate: &CatalogLeafItem, current: &CatalogLeafItem) -> bool {
    candidate.commit_timestamp > current.commit_timestamp
        || (candidate.commit_timestamp == current.commit_timestamp
            && candidate.is_delete()
            && !current.is_delete())
}
