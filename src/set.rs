use core::{borrow::Borrow, fmt, iter::FusedIterator, marker::PhantomPinned, ptr::NonNull};

use cordyceps::Linked;

use crate::{AvlTree, BsTree, InvariantViolation, Iter, Links, TreeNode};

struct SetNode<T> {
    links: Links<SetNode<T>>,
    value: T,
    _unpin: PhantomPinned,
}

impl<T> SetNode<T> {
    fn new(value: T) -> Box<Self> {
        Box::new(SetNode {
            links: Links::new(),
            value,
            _unpin: PhantomPinned,
        })
    }
}

unsafe impl<T> Linked<Links<SetNode<T>>> for SetNode<T> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<SetNode<T>>> {
        let ptr = ptr.as_ptr();
        // SAFETY: `ptr` is non-null, so a field projection of it is too.
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<T: Ord + fmt::Debug> TreeNode<Links<SetNode<T>>> for SetNode<T> {
    type Key = T;

    fn key(&self) -> &Self::Key {
        &self.value
    }
}

/// The result of inserting a value into an [`AvlSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum InsertOutcome {
    /// The value was added to the set.
    Inserted,
    /// An equal value was already present; the set is unchanged.
    Duplicate,
}

impl InsertOutcome {
    /// Returns `true` if the value was added.
    pub const fn is_inserted(self) -> bool {
        matches!(self, InsertOutcome::Inserted)
    }
}

/// An iterator over the values of a set in ascending order.
///
/// Created by [`AvlSet::inorder`] and [`BstMultiset::inorder`].
pub struct Values<'a, T: Ord + fmt::Debug> {
    iter: Iter<'a, SetNode<T>>,
}

impl<'a, T: Ord + fmt::Debug> Iterator for Values<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|node| &node.value)
    }
}

impl<T: Ord + fmt::Debug> FusedIterator for Values<'_, T> {}

/// An ordered set based on an [AVL tree].
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlSet<T: Ord + fmt::Debug> {
    tree: AvlTree<SetNode<T>>,
}

impl<T: Ord + fmt::Debug> AvlSet<T> {
    /// Creates a new, empty `AvlSet`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the set contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree, or `None` if the set is empty.
    pub fn height(&self) -> Option<usize> {
        self.tree.height()
    }

    /// Adds a value to the set.
    ///
    /// If an equal value is already present the set is left unchanged and `value` is dropped.
    #[inline]
    pub fn insert(&mut self, value: T) -> InsertOutcome {
        match self.tree.insert(SetNode::new(value)) {
            Ok(()) => InsertOutcome::Inserted,
            Err(_) => InsertOutcome::Duplicate,
        }
    }

    /// Removes a value from the set. Returns whether the value was present.
    #[inline]
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(value).is_some()
    }

    /// Returns `true` if the set contains `value`.
    #[inline]
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(value)
    }

    /// Returns the minimum value in the set.
    #[inline]
    pub fn min(&self) -> Option<&T> {
        self.tree.first().map(|node| &node.get_ref().value)
    }

    /// Returns the maximum value in the set.
    #[inline]
    pub fn max(&self) -> Option<&T> {
        self.tree.last().map(|node| &node.get_ref().value)
    }

    /// Returns the value at the root of the underlying tree.
    #[inline]
    pub fn root(&self) -> Option<&T> {
        self.tree.root().map(|node| &node.get_ref().value)
    }

    /// Returns an iterator over the values in ascending order.
    #[inline]
    pub fn inorder(&self) -> Values<'_, T> {
        Values {
            iter: self.tree.iter(),
        }
    }

    /// Returns an iterator over the values in pre-order of the underlying tree.
    #[inline]
    pub fn preorder(&self) -> impl Iterator<Item = &T> + '_ {
        self.tree.preorder().map(|node| &node.value)
    }

    /// Clears the set, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Checks every invariant of the underlying tree.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.tree.check_invariants()
    }

    /// Returns `true` if the underlying tree satisfies every invariant.
    pub fn validate(&self) -> bool {
        self.tree.validate()
    }
}

/// An ordered multiset based on an unbalanced binary search tree.
///
/// Equal values are all kept. Operations take time proportional to the height of the tree, which
/// is linear in the worst case.
pub struct BstMultiset<T: Ord + fmt::Debug> {
    tree: BsTree<SetNode<T>>,
}

impl<T: Ord + fmt::Debug> BstMultiset<T> {
    /// Creates a new, empty `BstMultiset`.
    pub const fn new() -> Self {
        Self {
            tree: BsTree::new(),
        }
    }

    /// Returns `true` if the multiset contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the multiset, counting repeats.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree, or `None` if the multiset is empty.
    pub fn height(&self) -> Option<usize> {
        self.tree.height()
    }

    /// Adds a value to the multiset.
    #[inline]
    pub fn insert(&mut self, value: T) {
        self.tree.insert(SetNode::new(value));
    }

    /// Removes one occurrence of a value. Returns whether the value was present.
    #[inline]
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(value).is_some()
    }

    /// Returns `true` if the multiset contains `value`.
    #[inline]
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(value)
    }

    #[inline]
    pub fn min(&self) -> Option<&T> {
        self.tree.first().map(|node| &node.get_ref().value)
    }

    #[inline]
    pub fn max(&self) -> Option<&T> {
        self.tree.last().map(|node| &node.get_ref().value)
    }

    #[inline]
    pub fn root(&self) -> Option<&T> {
        self.tree.root().map(|node| &node.get_ref().value)
    }

    /// Returns an iterator over the values in ascending order. Equal values are yielded in
    /// insertion order.
    #[inline]
    pub fn inorder(&self) -> Values<'_, T> {
        Values {
            iter: self.tree.iter(),
        }
    }

    #[inline]
    pub fn preorder(&self) -> impl Iterator<Item = &T> + '_ {
        self.tree.preorder().map(|node| &node.value)
    }

    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.tree.check_invariants()
    }

    pub fn validate(&self) -> bool {
        self.tree.validate()
    }
}

macro_rules! impl_set_traits {
    ($set:ident, $label:literal) => {
        impl<T: Ord + fmt::Debug> Default for $set<T> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<T: Ord + fmt::Debug> Extend<T> for $set<T> {
            fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
                for value in iter {
                    let _ = self.insert(value);
                }
            }
        }

        impl<T: Ord + fmt::Debug> FromIterator<T> for $set<T> {
            fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
                let mut set = Self::new();
                set.extend(iter);
                set
            }
        }

        impl<T: Ord + fmt::Debug> fmt::Debug for $set<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_set().entries(self.inorder()).finish()
            }
        }

        /// Renders the values in pre-order, which shows the shape of the tree.
        impl<T: Ord + fmt::Debug + fmt::Display> fmt::Display for $set<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, " pre-order {{ "))?;

                for (i, value) in self.preorder().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }

                f.write_str(" }")
            }
        }
    };
}

impl_set_traits!(AvlSet, "AVL");
impl_set_traits!(BstMultiset, "BST");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avl_set_surface() {
        let mut set = AvlSet::new();
        assert!(set.is_empty());
        assert_eq!(set.min(), None);
        assert_eq!(set.max(), None);
        assert_eq!(set.root(), None);

        for value in [10, 5, 15] {
            assert!(set.insert(value).is_inserted());
        }
        assert_eq!(set.insert(5), InsertOutcome::Duplicate);

        assert_eq!(set.len(), 3);
        assert!(set.contains(&15));
        assert!(!set.contains(&-10));
        assert_eq!(set.min(), Some(&5));
        assert_eq!(set.max(), Some(&15));
        assert_eq!(set.root(), Some(&10));

        assert!(set.remove(&10));
        assert!(!set.remove(&10));
        assert_eq!(set.inorder().copied().collect::<Vec<_>>(), [5, 15]);
        assert!(set.validate());

        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.inorder().count(), 0);
    }

    #[test]
    fn inorder_is_restartable() {
        let set: AvlSet<i32> = [8, 10, -4, 5, -1].into_iter().collect();

        let first: Vec<_> = set.inorder().collect();
        let second: Vec<_> = set.inorder().collect();
        assert_eq!(first, [&-4, &-1, &5, &8, &10]);
        assert_eq!(first, second);
    }

    #[test]
    fn borrowed_lookups() {
        let set: AvlSet<String> = ["A", "B", "C", "D", "E"]
            .into_iter()
            .map(String::from)
            .collect();

        assert!(set.contains("C"));
        assert_eq!(set.root().map(String::as_str), Some("B"));
        assert_eq!(set.to_string(), "AVL pre-order { B, A, D, C, E }");
    }

    #[test]
    fn display_shows_shape() {
        let set: AvlSet<u32> = [1, 2, 3].into_iter().collect();
        assert_eq!(set.to_string(), "AVL pre-order { 2, 1, 3 }");
        assert_eq!(format!("{set:?}"), "{1, 2, 3}");

        let bag: BstMultiset<u32> = [1, 2, 3].into_iter().collect();
        assert_eq!(bag.to_string(), "BST pre-order { 1, 2, 3 }");

        let empty: AvlSet<u32> = AvlSet::new();
        assert_eq!(empty.to_string(), "AVL pre-order {  }");
    }

    #[test]
    fn multiset_keeps_duplicates() {
        let mut bag: BstMultiset<u32> = [1, 1, 1, 1].into_iter().collect();
        assert_eq!(bag.len(), 4);
        assert_eq!(bag.height(), Some(3));
        assert!(bag.validate());

        assert!(bag.remove(&1));
        assert_eq!(bag.len(), 3);
        assert!(bag.contains(&1));

        bag.insert(0);
        assert_eq!(bag.min(), Some(&0));
        assert_eq!(bag.max(), Some(&1));
        assert_eq!(bag.inorder().copied().collect::<Vec<_>>(), [0, 1, 1, 1]);
    }
}
