//! Three-way merge of ordered id lists.
//!
//! The lists are rendered one hex id per line and merged with a line diff:
//! the patch from `base` to `mine` is applied to `theirs`. This is a textual
//! merge. It knows nothing about moves beyond what the diff infers.

use crate::model::PersistentId;

fn render(ids: &[PersistentId]) -> String {
    let mut s = String::with_capacity(ids.len() * 17);
    for id in ids {
        s.push_str(&id.to_string());
        s.push('\n');
    }
    s
}

fn parse(text: &str) -> Vec<PersistentId> {
    text.lines().filter_map(|line| line.trim().parse().ok()).collect()
}

/// Apply the `base` → `mine` edits to `theirs`.
///
/// Returns the merged list and `true` when every hunk applied. When any hunk
/// fails, returns `theirs` unchanged and `false`: the incoming order wins
/// outright, with no partial merge.
#[must_use]
pub fn three_way_merge(
    base: &[PersistentId],
    mine: &[PersistentId],
    theirs: &[PersistentId],
) -> (Vec<PersistentId>, bool) {
    let base_text = render(base);
    let mine_text = render(mine);
    let patch = diffy::create_patch(&base_text, &mine_text);
    match diffy::apply(&render(theirs), &patch) {
        Ok(merged) => (parse(&merged), true),
        Err(_) => (theirs.to_vec(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[u64]) -> Vec<PersistentId> {
        v.iter().copied().map(PersistentId).collect()
    }

    #[test]
    fn test_unchanged_everywhere() {
        let base = ids(&[1, 2, 3]);
        assert_eq!(three_way_merge(&base, &base, &base), (base.clone(), true));
        assert_eq!(three_way_merge(&[], &[], &[]), (vec![], true));
    }

    #[test]
    fn test_one_side_changed() {
        let base = ids(&[1, 2, 3]);
        let changed = ids(&[3, 1, 2, 4]);
        assert_eq!(three_way_merge(&base, &changed, &base), (changed.clone(), true));
        assert_eq!(three_way_merge(&base, &base, &changed), (changed, true));
    }

    #[test]
    fn test_disjoint_edits_merge_cleanly() {
        let base = ids(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let appended = ids(&[1, 2, 3, 4, 5, 6, 7, 8, 10]);
        let prefix_changed = ids(&[9, 2, 3, 4, 5, 6, 7, 8]);
        let (merged, ok) = three_way_merge(&base, &appended, &prefix_changed);
        assert!(ok);
        assert_eq!(merged, ids(&[9, 2, 3, 4, 5, 6, 7, 8, 10]));
    }

    #[test]
    fn test_conflict_keeps_theirs() {
        // Incoming order wins on conflict. This is the documented policy,
        // not a judgement that it is the right one.
        let base = ids(&[1, 2, 3]);
        let mine = ids(&[1, 5, 3]);
        let theirs = ids(&[1, 6, 3]);
        assert_eq!(three_way_merge(&base, &mine, &theirs), (theirs, false));
    }

    #[test]
    fn test_unparseable_lines_dropped() {
        let text = "0000000000000001\nnot-an-id\n\n0000000000000002\n";
        assert_eq!(parse(text), ids(&[1, 2]));
    }

    #[test]
    fn test_large_ids_survive_rendering() {
        let base = ids(&[u64::MAX, 0x8000_0000_0000_0000]);
        let mine = ids(&[0x8000_0000_0000_0000, u64::MAX]);
        assert_eq!(three_way_merge(&base, &mine, &base), (mine, true));
    }
}
