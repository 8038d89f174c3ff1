//! Structural invariant checks.
//!
//! These are diagnostics for tests and debugging. No mutating operation calls them.

use core::{cmp::Ordering, fmt, ptr::NonNull};

use thiserror::Error;

use crate::{height_of, AvlTree, BsTree, Dir, Links, TreeNode};

/// A broken structural invariant, reported by `check_invariants`.
///
/// Keys are rendered with their `Debug` implementation. Any of these indicates a bug in the tree
/// (or a key whose ordering changed while it was linked), not a condition to recover from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("root node {key} has a parent link")]
    RootHasParent { key: String },

    #[error("node {child} is a child of {parent} but its parent link points elsewhere")]
    ParentMismatch { parent: String, child: String },

    #[error("node {key} is on the wrong side of its ancestor {bound}")]
    OutOfOrder { key: String, bound: String },

    #[error("key {key} is stored more than once")]
    DuplicateKey { key: String },

    #[error("node {key} stores height {stored} but its subtree has height {expected}")]
    HeightMismatch { key: String, stored: i8, expected: i8 },

    #[error("node {key} has balance factor {balance}")]
    Unbalanced { key: String, balance: i8 },
}

fn describe<K: fmt::Debug + ?Sized>(key: &K) -> String {
    format!("{key:?}")
}

impl<T> BsTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Checks the ordering and the parent links of every node.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.check_with(false)
    }

    /// Returns `true` if [`check_invariants`](Self::check_invariants) finds nothing wrong.
    pub fn validate(&self) -> bool {
        self.check_invariants().is_ok()
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        if let Err(violation) = self.check_invariants() {
            panic!("{violation}");
        }
    }

    // Walks the tree in pre-order, stopping at the first violation.
    //
    // Each pending node carries the keys of the nearest ancestors it must sort after and before.
    // A balanced tree must not hold equal keys, and must also have correct heights and balance
    // factors.
    pub(crate) fn check_with(&self, balanced: bool) -> Result<(), InvariantViolation> {
        let Some(root) = self.root else {
            return Ok(());
        };

        unsafe {
            if T::links(root).as_ref().parent().is_some() {
                return Err(InvariantViolation::RootHasParent {
                    key: describe(root.as_ref().key()),
                });
            }
        }

        let mut stack: Vec<(NonNull<T>, Option<&T::Key>, Option<&T::Key>)> =
            vec![(root, None, None)];

        while let Some((node, lower, upper)) = stack.pop() {
            let (key, links) = unsafe { (node.as_ref().key(), T::links(node).as_ref()) };

            if let Some(upper) = upper.filter(|&upper| key >= upper) {
                return Err(InvariantViolation::OutOfOrder {
                    key: describe(key),
                    bound: describe(upper),
                });
            }

            if let Some(lower) = lower {
                match key.cmp(lower) {
                    Ordering::Less => {
                        return Err(InvariantViolation::OutOfOrder {
                            key: describe(key),
                            bound: describe(lower),
                        })
                    }
                    Ordering::Equal if balanced => {
                        return Err(InvariantViolation::DuplicateKey { key: describe(key) })
                    }
                    _ => {}
                }
            }

            if balanced {
                let (left, right) = unsafe { (height_of(links.left()), height_of(links.right())) };

                let expected = 1 + left.max(right);
                if links.height() != expected {
                    return Err(InvariantViolation::HeightMismatch {
                        key: describe(key),
                        stored: links.height(),
                        expected,
                    });
                }

                let balance = right - left;
                if !(-1..=1).contains(&balance) {
                    return Err(InvariantViolation::Unbalanced {
                        key: describe(key),
                        balance,
                    });
                }
            }

            // Right first, so the left subtree is checked first.
            let pending = [
                (Dir::Right, Some(key), upper),
                (Dir::Left, lower, Some(key)),
            ];

            for (dir, lower, upper) in pending {
                let Some(child) = links.child(dir) else {
                    continue;
                };

                unsafe {
                    if T::links(child).as_ref().parent() != Some(node) {
                        return Err(InvariantViolation::ParentMismatch {
                            parent: describe(key),
                            child: describe(child.as_ref().key()),
                        });
                    }
                }

                stack.push((child, lower, upper));
            }
        }

        Ok(())
    }
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Checks every invariant of the tree: strict key ordering, parent links, stored heights and
    /// balance factors.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.tree.check_with(true)
    }

    /// Returns `true` if [`check_invariants`](Self::check_invariants) finds nothing wrong.
    pub fn validate(&self) -> bool {
        self.check_invariants().is_ok()
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        if let Err(violation) = self.check_invariants() {
            panic!("{violation}");
        }
    }
}

#[cfg(test)]
mod tests {
    use cordyceps::Linked;

    use crate::model::TestNode;

    use super::*;

    fn avl(keys: &[u32]) -> AvlTree<TestNode> {
        let mut tree = AvlTree::new();
        for &key in keys {
            tree.insert(TestNode::new(key)).expect("keys are distinct");
        }
        tree
    }

    fn node(tree: &AvlTree<TestNode>, key: u32) -> NonNull<TestNode> {
        tree.tree.get_raw(&key).expect("key present")
    }

    #[test]
    fn empty_and_valid_trees_pass() {
        assert_eq!(AvlTree::<TestNode>::new().check_invariants(), Ok(()));
        assert!(avl(&[4, 2, 6, 1, 3, 5, 7]).validate());
    }

    #[test]
    fn detects_stale_height() {
        let tree = avl(&[2, 1, 3]);
        unsafe { TestNode::links(node(&tree, 1)).as_mut().set_height(2) };

        assert_eq!(
            tree.check_invariants(),
            Err(InvariantViolation::HeightMismatch {
                key: "2".into(),
                stored: 1,
                expected: 3,
            })
        );
        assert!(!tree.validate());

        // Restoring the height makes the tree valid again.
        unsafe { TestNode::links(node(&tree, 1)).as_mut().set_height(0) };
        assert!(tree.validate());
    }

    #[test]
    fn detects_broken_parent_link() {
        let tree = avl(&[2, 1, 3]);
        let three = node(&tree, 3);
        unsafe { TestNode::links(node(&tree, 1)).as_mut().set_parent(Some(three)) };

        assert_eq!(
            tree.check_invariants(),
            Err(InvariantViolation::ParentMismatch {
                parent: "2".into(),
                child: "1".into(),
            })
        );

        let two = node(&tree, 2);
        unsafe { TestNode::links(node(&tree, 1)).as_mut().set_parent(Some(two)) };
        assert!(tree.validate());
    }

    #[test]
    fn duplicates_only_break_balanced_trees() {
        let mut tree = AvlTree::new();
        tree.tree.insert(TestNode::new(2));
        tree.tree.insert(TestNode::new(2));
        assert_eq!(tree.tree.check_invariants(), Ok(()));

        // Give the root a correct height so the duplicate is the only problem.
        let root = tree.tree.root.expect("tree is not empty");
        unsafe { TestNode::links(root).as_mut().set_height(1) };

        assert_eq!(
            tree.check_invariants(),
            Err(InvariantViolation::DuplicateKey { key: "2".into() })
        );
    }

    #[test]
    fn detects_unbalanced_chain() {
        let mut tree = AvlTree::new();
        tree.tree.insert(TestNode::new(1));
        tree.tree.insert(TestNode::new(2));
        tree.tree.insert(TestNode::new(3));

        // Fix up heights by hand so only the balance rule is broken.
        unsafe {
            TestNode::links(node(&tree, 2)).as_mut().set_height(1);
            TestNode::links(node(&tree, 1)).as_mut().set_height(2);
        }

        assert_eq!(
            tree.check_invariants(),
            Err(InvariantViolation::Unbalanced {
                key: "1".into(),
                balance: 2,
            })
        );
    }

    #[test]
    fn violation_messages_name_the_node() {
        let violation = InvariantViolation::Unbalanced {
            key: "7".into(),
            balance: -2,
        };
        assert_eq!(violation.to_string(), "node 7 has balance factor -2");
    }
}
