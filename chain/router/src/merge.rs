//! Combining per-shard cursors into one result stream: a k-way merge when the query carries a sort and the sort is
//! a prefix of (or compatible with) the shard key, a round-robin interleave
//! otherwise.

use std::cmp::Ordering;

use db_document::Document;

/// A comparator over documents, supplied by the caller from the query's
/// sort spec. Not modeled as a full sort-key compiler here — the
/// dispatcher is responsible for turning a sort document into one of
/// these.
pub trait DocumentOrder {
    fn compare(&self, a: &Document, b: &Document) -> Ordering;
}

/// Merges `shard_batches` (one already-sorted batch of documents per
/// shard, in the order the dispatcher fetched them) into a single
/// ascending stream per `order`. Each input batch must itself already be
/// sorted by `order`; this performs the merge step only, not a sort.
pub fn k_way_merge(shard_batches: Vec<Vec<Document>>, order: &dyn DocumentOrder) -> Vec<Document> {
    let mut cursors: Vec<(Vec<Document>, usize)> = shard_batches.into_iter().map(|batch| (batch, 0)).collect();
    let mut merged = Vec::new();
    loop {
        let mut best: Option<usize> = None;
        for (i, (batch, pos)) in cursors.iter().enumerate() {
            if *pos >= batch.len() {
                continue;
            }
            best = match best {
                None => Some(i),
                Some(b) => {
                    let (b_batch, b_pos) = &cursors[b];
                    if order.compare(&batch[*pos], &b_batch[*b_pos]) == Ordering::Less {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        match best {
            None => break,
            Some(i) => {
                let (batch, pos) = &mut cursors[i];
                merged.push(batch[*pos].clone());
                *pos += 1;
            }
        }
    }
    merged
}

/// Round-robin interleave for unsorted (or non-shard-key-sorted) queries:
/// no ordering guarantee is owed to the client, so this just avoids
/// starving any one shard's cursor while batches remain on several.
pub fn interleave(shard_batches: Vec<Vec<Document>>) -> Vec<Document> {
    let max_len = shard_batches.iter().map(|b| b.len()).max().unwrap_or(0);
    let mut merged = Vec::new();
    for i in 0..max_len {
        for batch in &shard_batches {
            if let Some(doc) = batch.get(i) {
                merged.push(doc.clone());
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_document::Value;

    struct ByField(&'static str);

    impl DocumentOrder for ByField {
        fn compare(&self, a: &Document, b: &Document) -> Ordering {
            let av = a.get(self.0).cloned().unwrap_or(Value::Null);
            let bv = b.get(self.0).cloned().unwrap_or(Value::Null);
            db_document::value::compare(&av, &bv)
        }
    }

    fn doc(x: i32) -> Document {
        Document::builder().field("x", Value::Int32(x)).build()
    }

    #[test]
    fn k_way_merge_interleaves_two_sorted_shard_batches_in_order() {
        let merged = k_way_merge(vec![vec![doc(1), doc(3), doc(5)], vec![doc(2), doc(4)]], &ByField("x"));
        let xs: Vec<i32> = merged.iter().map(|d| match d.get("x").unwrap() {
            Value::Int32(v) => *v,
            _ => unreachable!(),
        }).collect();
        assert_eq!(xs, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn k_way_merge_handles_an_empty_shard_batch() {
        let merged = k_way_merge(vec![vec![], vec![doc(1), doc(2)]], &ByField("x"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn interleave_round_robins_across_uneven_batches() {
        let merged = interleave(vec![vec![doc(1), doc(2)], vec![doc(10)]]);
        let xs: Vec<i32> = merged.iter().map(|d| match d.get("x").unwrap() {
            Value::Int32(v) => *v,
            _ => unreachable!(),
        }).collect();
        assert_eq!(xs, vec![1, 10, 2]);
    }
}
