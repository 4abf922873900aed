//! Process-wide variant store: deduplicates calls discovered
//! by independent window workers and flushes them to the writer in reference
//! order. Guarded by a `std::sync::Mutex`, whose `try_lock` gives a
//! non-blocking `try_add` alongside the blocking `force_add`.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::call::variant_call::VariantCall;
use crate::windowing::Window;

/// Deduplicating store for [`VariantCall`]s keyed by their identity hash.
/// `try_add`/`force_add` are safe to call from any worker thread; only the
/// main thread ever calls `flush_window`/`flush_all`.
pub struct VariantStore {
    data: Mutex<HashMap<u64, VariantCall>>,
}

impl Default for VariantStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantStore {
    pub fn new() -> Self {
        Self { data: Mutex::new(HashMap::new()) }
    }

    /// Non-blocking add. Returns `true` iff the lock was acquired and the
    /// batch was merged.
    pub fn try_add(&self, batch: Vec<(u64, VariantCall)>) -> bool {
        match self.data.try_lock() {
            Ok(mut data) => {
                merge_batch(&mut data, batch);
                true
            }
            Err(_) => false,
        }
    }

    /// Blocking add.
    pub fn force_add(&self, batch: Vec<(u64, VariantCall)>) {
        let mut data = self.data.lock().expect("variant store lock poisoned");
        merge_batch(&mut data, batch);
    }

    /// Remove and return every variant whose `(contig_idx, pos)` is at or
    /// before the end of `window`, sorted by `(contig_idx, pos, ref, alt)`.
    pub fn flush_window(&self, window: &Window) -> Vec<VariantCall> {
        let mut data = self.data.lock().expect("variant store lock poisoned");
        let ids: Vec<u64> = data.iter().filter(|(_, v)| is_in_or_before(v, window)).map(|(id, _)| *id).collect();
        extract_and_sort(&mut data, &ids)
    }

    /// Remove and return every remaining variant, sorted.
    pub fn flush_all(&self) -> Vec<VariantCall> {
        let mut data = self.data.lock().expect("variant store lock poisoned");
        let ids: Vec<u64> = data.keys().copied().collect();
        extract_and_sort(&mut data, &ids)
    }
}

fn extract_and_sort(data: &mut HashMap<u64, VariantCall>, ids: &[u64]) -> Vec<VariantCall> {
    let mut out: Vec<VariantCall> = ids.iter().filter_map(|id| data.remove(id)).collect();
    out.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    out
}

fn is_in_or_before(v: &VariantCall, window: &Window) -> bool {
    if v.contig_idx != window.region.contig_idx {
        return v.contig_idx < window.region.contig_idx;
    }
    v.pos1 <= window.region.end0 + 1
}

/// Keep the entry whose total (tumor+normal) coverage is higher; ties keep
/// the already-stored entry.
fn merge_batch(data: &mut HashMap<u64, VariantCall>, batch: Vec<(u64, VariantCall)>) {
    for (id, incoming) in batch {
        match data.get(&id) {
            None => {
                data.insert(id, incoming);
            }
            Some(existing) => {
                let existing_cov = existing.normal.dp + existing.tumor.dp;
                let incoming_cov = incoming.normal.dp + incoming.tumor.dp;
                if incoming_cov > existing_cov {
                    data.insert(id, incoming);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::variant_call::SampleFields;
    use crate::call::variant_call::SomaticState;
    use crate::transcript::VariantKind;
    use crate::windowing::Region;

    fn fields(dp: u32) -> SampleFields {
        SampleFields { gt: "0/1", gq: 40, ad: (dp / 2, dp / 2), sr: (dp / 2, 0), sa: (dp / 2, 0), dp, hp_alt: None, hp_ref: None }
    }

    fn call(contig_idx: usize, pos1: u64, dp: u32) -> VariantCall {
        VariantCall {
            contig_idx,
            pos1,
            ref_allele: "A".to_string(),
            alt_allele: "G".to_string(),
            qual: 30,
            filters: vec![],
            somatic_state: SomaticState::Somatic,
            fets: 30,
            kind: VariantKind::Snv,
            len: 1,
            kmer_size: 21,
            sb: 0,
            str_info: None,
            normal: fields(dp),
            tumor: fields(dp),
        }
    }

    #[test]
    fn try_add_then_flush_all_returns_the_variant() {
        let store = VariantStore::new();
        assert!(store.try_add(vec![(1, call(0, 100, 20))]));
        let flushed = store.flush_all();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].pos1, 100);
    }

    #[test]
    fn higher_coverage_entry_wins_on_merge() {
        let store = VariantStore::new();
        store.force_add(vec![(1, call(0, 100, 10))]);
        store.force_add(vec![(1, call(0, 100, 40))]);
        let flushed = store.flush_all();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].normal.dp, 40);
    }

    #[test]
    fn flush_window_only_drains_variants_at_or_before_its_end() {
        let store = VariantStore::new();
        store.force_add(vec![(1, call(0, 50, 20)), (2, call(0, 500, 20))]);
        let window = Window { region: Region { contig_idx: 0, start0: 0, end0: 200 }, index: 0 };
        let flushed = store.flush_window(&window);
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].pos1, 50);
        let remaining = store.flush_all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].pos1, 500);
    }

    #[test]
    fn flush_sorts_by_contig_then_position_then_alleles() {
        let store = VariantStore::new();
        store.force_add(vec![(1, call(0, 200, 20)), (2, call(0, 50, 20)), (3, call(1, 10, 20))]);
        let flushed = store.flush_all();
        let positions: Vec<(usize, u64)> = flushed.iter().map(|v| (v.contig_idx, v.pos1)).collect();
        assert_eq!(positions, vec![(0, 50), (0, 200), (1, 10)]);
    }
}
