//! Identity keying for child positions
//!
//! Keyed children are slotted by `(kind, key)`. Keyless children are slotted
//! by their index among the keyless siblings of the same kind, so inserting a
//! keyed sibling, or a sibling of another kind, never shifts them.

use blinc_core::{Identity, KindId, Segment, Slot};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::descriptor::Descriptor;
use crate::error::{ReconcileError, Result};

/// Segment for the root descriptor
pub fn root_segment(descriptor: &Descriptor) -> Segment {
    let slot = match descriptor.key() {
        Some(key) => Slot::Key(key.clone()),
        None => Slot::Index(0),
    };
    Segment::new(descriptor.kind(), slot)
}

/// Segments for `children` of the node at `parent`, in declaration order
pub fn assign_segments(parent: &Identity, children: &[Descriptor]) -> Result<Vec<Segment>> {
    let mut keyless: FxHashMap<KindId, u32> = FxHashMap::default();
    let mut seen = FxHashSet::default();
    let mut segments = Vec::with_capacity(children.len());

    for child in children {
        let kind = child.kind();
        let slot = match child.key() {
            Some(key) => {
                if !seen.insert((kind, key)) {
                    return Err(ReconcileError::DuplicateKey {
                        parent: parent.clone(),
                        kind,
                        key: key.clone(),
                    });
                }
                Slot::Key(key.clone())
            }
            None => {
                let index = keyless.entry(kind).or_insert(0);
                let slot = Slot::Index(*index);
                *index += 1;
                slot
            }
        };
        segments.push(Segment::new(kind, slot));
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blinc_core::Key;

    struct Root;
    struct Row;
    struct Divider;

    fn parent() -> Identity {
        Identity::root(Segment::new(KindId::of::<Root>(), Slot::Index(0)))
    }

    fn row() -> Descriptor {
        Descriptor::dynamic(KindId::of::<Row>(), ())
    }

    fn divider() -> Descriptor {
        Descriptor::dynamic(KindId::of::<Divider>(), ())
    }

    #[test]
    fn test_keyless_index_counts_per_kind() {
        let segments =
            assign_segments(&parent(), &[row(), divider(), row(), row().with_key("k"), row()])
                .unwrap();

        let slots: Vec<_> = segments.iter().map(|s| s.slot().clone()).collect();
        assert_eq!(
            slots,
            vec![
                Slot::Index(0),
                Slot::Index(0),
                Slot::Index(1),
                Slot::Key(Key::from("k")),
                Slot::Index(2),
            ]
        );
        assert_eq!(segments[1].kind(), KindId::of::<Divider>());
    }

    #[test]
    fn test_same_key_different_kind_is_allowed() {
        let segments = assign_segments(&parent(), &[row().with_key(1), divider().with_key(1)]);
        assert!(segments.is_ok());
    }

    #[test]
    fn test_duplicate_key() {
        let err = assign_segments(&parent(), &[row().with_key("a"), row().with_key("a")])
            .unwrap_err();
        match err {
            ReconcileError::DuplicateKey { parent: at, kind, key } => {
                assert_eq!(at, parent());
                assert_eq!(kind, KindId::of::<Row>());
                assert_eq!(key, Key::from("a"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_root_segment() {
        assert_eq!(root_segment(&row()).slot(), &Slot::Index(0));
        assert_eq!(
            root_segment(&row().with_key("app")).slot(),
            &Slot::Key(Key::from("app"))
        );
    }
}
