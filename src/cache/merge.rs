//! Merging pending (not-yet-synced) creations into a remote page window.
//!
//! When the remote list is unavailable or pending rows exist, list screens
//! show synthetic rows for queued creations. Synthetic rows occupy the tail
//! of the item space: remote rows fill positions `0..remote_total`, pending
//! rows fill `remote_total..remote_total + pending.len()`. Paging through
//! the mixed list never skips or duplicates a row.

#[derive(Debug, Clone, PartialEq)]
pub struct MergedPage<T> {
    pub items: Vec<T>,
    /// Grand total reported to the UI: remote total plus pending count.
    pub total: usize,
}

/// Merge the pending slice for the page window `(offset, limit)`.
///
/// `remote_items` are the remote rows already fetched for this window (may
/// be fewer than `limit` on the last remote page, or empty when offset is
/// past the remote total); `remote_total` is the last known remote count
/// for the query.
pub fn merge_page<T: Clone>(
    remote_items: &[T],
    remote_total: usize,
    pending: &[T],
    offset: usize,
    limit: usize,
) -> MergedPage<T> {
    let start = offset.saturating_sub(remote_total).min(pending.len());
    let end = (offset + limit)
        .saturating_sub(remote_total)
        .min(pending.len())
        .max(start);

    let mut items = Vec::with_capacity(limit);
    items.extend_from_slice(remote_items);
    items.extend_from_slice(&pending[start..end]);
    items.truncate(limit);

    MergedPage {
        items,
        total: remote_total + pending.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_window(total: usize, offset: usize, limit: usize) -> Vec<String> {
        (offset..total.min(offset + limit))
            .map(|i| format!("r{}", i))
            .collect()
    }

    fn pending(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p{}", i)).collect()
    }

    #[test]
    fn test_tail_page_mixes_remote_and_pending() {
        // remote_total=12, pageSize=5, 3 pending, offset=10:
        // last 2 remote rows plus all 3 pending, total 15
        let remote = remote_window(12, 10, 5);
        let page = merge_page(&remote, 12, &pending(3), 10, 5);

        assert_eq!(page.items, vec!["r10", "r11", "p0", "p1", "p2"]);
        assert_eq!(page.total, 15);
    }

    #[test]
    fn test_pending_never_precede_remote() {
        let remote = remote_window(12, 0, 5);
        let page = merge_page(&remote, 12, &pending(3), 0, 5);
        assert_eq!(page.items, vec!["r0", "r1", "r2", "r3", "r4"]);
        assert_eq!(page.total, 15);
    }

    #[test]
    fn test_page_fully_inside_pending() {
        // Window entirely past the remote total
        let page = merge_page(&[], 2, &pending(6), 4, 3);
        assert_eq!(page.items, vec!["p2", "p3", "p4"]);
        assert_eq!(page.total, 8);
    }

    #[test]
    fn test_paging_covers_every_row_once() {
        let remote_total = 12;
        let pend = pending(3);
        let mut seen = Vec::new();

        for page_idx in 0..3 {
            let offset = page_idx * 5;
            let remote = remote_window(remote_total, offset, 5);
            let page = merge_page(&remote, remote_total, &pend, offset, 5);
            seen.extend(page.items);
        }

        assert_eq!(seen.len(), 15);
        let mut deduped = seen.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), 15, "no row appears on two pages");
    }

    #[test]
    fn test_no_pending_is_passthrough() {
        let remote = remote_window(7, 5, 5);
        let page = merge_page(&remote, 7, &Vec::<String>::new(), 5, 5);
        assert_eq!(page.items, vec!["r5", "r6"]);
        assert_eq!(page.total, 7);
    }

    #[test]
    fn test_offset_far_past_everything() {
        let page = merge_page(&[], 2, &pending(2), 100, 5);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 4);
    }
}
