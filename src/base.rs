use core::{borrow::Borrow, cmp::Ordering, pin::Pin, ptr::NonNull};

use tracing::trace;

use crate::{
    iter::{Iter, Preorder},
    Dir, Link, Links, TreeNode,
};

/// An intrusive, unbalanced binary search tree.
///
/// Keys equal to an existing key are inserted into its right subtree. Nothing is done to bound the
/// height of the tree: inserting keys in sorted order produces a chain.
///
/// [`AvlTree`](crate::AvlTree) is built on top of this type's splice primitives.
pub struct BsTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) root: Link<T>,
}

/// How `find_slot` treats a key equal to one already in the tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Duplicates {
    /// Keep descending into the right subtree.
    Right,
    /// Stop at the node holding the equal key.
    Reject,
}

/// Where a new node is to be linked.
pub(crate) enum InsertAs<T: ?Sized> {
    Root,
    Child { parent: NonNull<T>, dir: Dir },
}

/// The outcome of searching for an insertion position.
pub(crate) enum Slot<T: ?Sized> {
    Occupied(NonNull<T>),
    Vacant(InsertAs<T>),
}

impl<T> BsTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> BsTree<T> {
        BsTree { root: None }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of elements in the tree.
    ///
    /// The tree keeps no counter, so this walks every node.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns the number of edges on the longest path from the root to a leaf, or `None` if the
    /// tree is empty.
    ///
    /// This walks every node.
    pub fn height(&self) -> Option<usize> {
        let root = self.root?;

        let mut max = 0;
        let mut stack = vec![(root, 0_usize)];

        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);

            let links = unsafe { T::links(node).as_ref() };
            stack.extend(links.left().map(|left| (left, depth + 1)));
            stack.extend(links.right().map(|right| (right, depth + 1)));
        }

        Some(max)
    }

    /// Returns the root node of the tree.
    pub fn root(&self) -> Option<Pin<&T>> {
        self.root
            .map(|root| unsafe { Pin::new_unchecked(root.as_ref()) })
    }

    /// Returns a reference to the node corresponding to `key`.
    ///
    /// If several nodes hold an equal key, the one closest to the root is returned.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns `true` if the tree contains a node with a key equal to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let root = self.root?;

        unsafe {
            let (first, _) = self.min_in_subtree(root);
            Some(Pin::new_unchecked(first.as_ref()))
        }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let mut cur = self.root?;

        unsafe {
            while let Some(right) = T::links(cur).as_ref().right() {
                cur = right;
            }

            Some(Pin::new_unchecked(cur.as_ref()))
        }
    }

    /// Returns an iterator over the nodes of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns an iterator over the nodes of the tree in pre-order: each node before its left
    /// subtree, and the left subtree before the right.
    pub fn preorder(&self) -> Preorder<'_, T> {
        Preorder::new(self)
    }

    /// Inserts an item into the tree.
    ///
    /// The item is always linked, even if an equal key is already present.
    pub fn insert(&mut self, item: T::Handle) {
        let ptr = T::into_ptr(item);

        match self.find_slot(unsafe { ptr.as_ref().key() }, Duplicates::Right) {
            Slot::Vacant(insert_as) => unsafe { self.link_at(ptr, insert_as) },
            Slot::Occupied(_) => unreachable!("equal keys descend to the right"),
        }
    }

    /// Removes the node corresponding to `key` from the tree and returns it.
    ///
    /// If several nodes hold an equal key, the one closest to the root is removed.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;

        unsafe {
            self.unlink(node);
            Some(T::from_ptr(node))
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| T::links(cur).as_ref().parent());

                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                drop(T::from_ptr(cur));

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
    }

    // Splice primitives ======================================================

    // Descends from the root to the position where a node with `key` belongs.
    //
    // Smaller keys go left and greater keys go right. An equal key either continues to the right
    // or ends the search, depending on `duplicates`.
    pub(crate) fn find_slot<Q>(&self, key: &Q, duplicates: Duplicates) -> Slot<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(mut cur) = self.root else {
            return Slot::Vacant(InsertAs::Root);
        };

        loop {
            let dir = match key.cmp(unsafe { cur.as_ref().key().borrow() }) {
                Ordering::Less => Dir::Left,
                Ordering::Equal if duplicates == Duplicates::Reject => {
                    return Slot::Occupied(cur);
                }
                Ordering::Equal | Ordering::Greater => Dir::Right,
            };

            match unsafe { T::links(cur).as_ref().child(dir) } {
                Some(child) => cur = child,
                None => return Slot::Vacant(InsertAs::Child { parent: cur, dir }),
            }
        }
    }

    // Links `ptr` into the position found by `find_slot`. The node starts out as a leaf.
    //
    // # Safety
    //
    // `insert_as` must have been returned by `find_slot` for `ptr`'s key, with no mutation of the
    // tree in between.
    pub(crate) unsafe fn link_at(&mut self, ptr: NonNull<T>, insert_as: InsertAs<T>) {
        unsafe {
            T::links(ptr).as_mut().reset();

            match insert_as {
                InsertAs::Root => {
                    debug_assert!(self.root.is_none());
                    self.root = Some(ptr);
                }

                InsertAs::Child { parent, dir } => {
                    debug_assert!(T::links(parent).as_ref().child(dir).is_none());
                    T::links(parent).as_mut().set_child(dir, Some(ptr));
                    T::links(ptr).as_mut().set_parent(Some(parent));
                }
            }
        }
    }

    // Unlinks `node` from the tree without rebalancing.
    //
    // Returns the deepest node whose subtree changed shape, which is where a rebalancing walk must
    // start. `None` means only the root position changed.
    //
    // # Safety
    //
    // `node` must be an element of `self`.
    pub(crate) unsafe fn unlink(&mut self, node: NonNull<T>) -> Link<T> {
        unsafe {
            let (left, right) = {
                let links = T::links(node).as_ref();
                (links.left(), links.right())
            };

            let change_point = match (left, right) {
                (None, None) => self.unlink_leaf(node),
                (Some(child), None) | (None, Some(child)) => self.unlink_unary(node, child),
                (Some(left), Some(right)) => self.unlink_binary(node, left, right),
            };

            T::links(node).as_mut().reset();

            change_point
        }
    }

    // The parent loses a child.
    unsafe fn unlink_leaf(&mut self, node: NonNull<T>) -> Link<T> {
        unsafe {
            trace!(key = ?node.as_ref().key(), "unlinking leaf");

            let parent = T::links(node).as_ref().parent();
            self.replace_child_or_set_root(parent, node, None);

            parent
        }
    }

    // The sole child takes `node`'s place; its own subtree is untouched.
    unsafe fn unlink_unary(&mut self, node: NonNull<T>, child: NonNull<T>) -> Link<T> {
        unsafe {
            trace!(key = ?node.as_ref().key(), "unlinking unary node");

            let parent = T::links(node).as_ref().parent();
            self.replace_child_or_set_root(parent, node, Some(child));
            T::links(child).as_mut().set_parent(parent);

            parent
        }
    }

    // `node`'s successor[^1] is relinked into `node`'s place. If the successor is not `right`,
    // its own right child is elevated into the slot it leaves behind.
    //
    // Returns the successor if it was `right`, and otherwise the successor's former parent.
    //
    // [^1]: The successor of a node `a` is the least node in `a`'s right subtree.
    unsafe fn unlink_binary(
        &mut self,
        node: NonNull<T>,
        left: NonNull<T>,
        right: NonNull<T>,
    ) -> Link<T> {
        unsafe {
            let parent = T::links(node).as_ref().parent();
            let (successor, successor_parent) = self.min_in_subtree(right);

            trace!(
                key = ?node.as_ref().key(),
                successor = ?successor.as_ref().key(),
                "unlinking binary node"
            );

            let change_point = match successor_parent {
                // The successor is `right` and keeps its right subtree.
                None => successor,

                Some(successor_parent) => {
                    let successor_right = T::links(successor).as_ref().right();
                    T::links(successor_parent)
                        .as_mut()
                        .set_left(successor_right);
                    self.maybe_set_parent(successor_right, Some(successor_parent));

                    T::links(successor).as_mut().set_right(Some(right));
                    T::links(right).as_mut().set_parent(Some(successor));

                    successor_parent
                }
            };

            T::links(successor).as_mut().set_left(Some(left));
            T::links(left).as_mut().set_parent(Some(successor));

            self.replace_child_or_set_root(parent, node, Some(successor));
            T::links(successor).as_mut().set_parent(parent);

            Some(change_point)
        }
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    pub(crate) unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Link<T>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { T::links(cur).as_ref().left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    // Support methods ========================================================

    pub(crate) unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    // Points whatever referred to `old_child` (its parent's child link, or the root) at
    // `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    #[inline]
    pub(crate) unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => {
                debug_assert_eq!(self.root, Some(old_child));
                self.root = new_child;
            }
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            if let Some(new_child) = new_child {
                debug_assert_ne!(
                    T::links(parent).as_ref().child(!dir),
                    Some(new_child),
                    "`new_child` must not be a child of `parent`"
                );
            }

            T::links(parent).as_mut().set_child(dir, new_child);
        }
    }

    pub(crate) unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        let links = unsafe { T::links(parent).as_ref() };

        if links.left() == Some(child) {
            Dir::Left
        } else {
            debug_assert_eq!(
                links.right(),
                Some(child),
                "`child` must be a child of `parent`"
            );
            Dir::Right
        }
    }

    pub(crate) fn sibling(&self, node: NonNull<T>) -> Link<T> {
        unsafe {
            let parent = T::links(node).as_ref().parent()?;
            let dir = self.which_child(parent, node);

            T::links(parent).as_ref().child(!dir)
        }
    }
}

impl<T> Default for BsTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for BsTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::model::TestNode;

    use super::*;

    fn build(keys: &[u32]) -> BsTree<TestNode> {
        let mut tree = BsTree::new();
        for &key in keys {
            tree.insert(TestNode::new(key));
            tree.assert_invariants();
        }
        tree
    }

    fn preorder(tree: &BsTree<TestNode>) -> Vec<u32> {
        tree.preorder().map(|node| node.key).collect()
    }

    #[test]
    fn sorted_insertion_makes_a_chain() {
        let tree = build(&[1, 2, 3, 4, 5]);
        assert_eq!(tree.height(), Some(4));
        assert_eq!(preorder(&tree), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn duplicates_descend_right() {
        let mut tree = build(&[1, 1, 1, 1]);
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.height(), Some(3));

        // The shallowest equal node is removed and its right chain moves up.
        assert_eq!(tree.remove(&1).map(|node| node.key), Some(1));
        tree.assert_invariants();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.height(), Some(2));
    }

    #[test]
    fn remove_leaf() {
        let mut tree = build(&[50, 40, 60, 30, 70, 20, 80, 45]);
        assert_eq!(tree.remove(&45).map(|node| node.key), Some(45));
        tree.assert_invariants();
        assert_eq!(preorder(&tree), [50, 40, 30, 20, 60, 70, 80]);
    }

    #[test]
    fn remove_unary() {
        let mut tree = build(&[50, 40, 60, 30, 70, 20, 80, 45]);
        assert_eq!(tree.remove(&30).map(|node| node.key), Some(30));
        tree.assert_invariants();
        assert_eq!(preorder(&tree), [50, 40, 20, 45, 60, 70, 80]);

        assert_eq!(tree.remove(&60).map(|node| node.key), Some(60));
        tree.assert_invariants();
        assert_eq!(preorder(&tree), [50, 40, 20, 45, 70, 80]);
    }

    #[test]
    fn remove_binary_successor_is_right_child() {
        let mut tree = build(&[50, 40, 60, 30, 70, 20, 80, 45]);
        assert_eq!(tree.remove(&40).map(|node| node.key), Some(40));
        tree.assert_invariants();
        assert_eq!(preorder(&tree), [50, 45, 30, 20, 60, 70, 80]);
    }

    #[test]
    fn remove_binary_successor_is_deeper() {
        let mut tree = build(&[10, 5, 20, 15, 17, 30]);
        assert_eq!(tree.remove(&10).map(|node| node.key), Some(10));
        tree.assert_invariants();
        assert_eq!(preorder(&tree), [15, 5, 20, 17, 30]);
    }

    #[test]
    fn remove_root_until_empty() {
        let keys: Vec<u32> = (0..34).step_by(3).collect();
        let mut tree = build(&keys);

        while let Some(root) = tree.root().map(|node| node.key) {
            assert_eq!(tree.remove(&root).map(|node| node.key), Some(root));
            tree.assert_invariants();
        }

        assert!(tree.is_empty());
    }

    #[test]
    fn remove_missing() {
        let mut tree = build(&[2, 1, 3]);
        assert!(tree.remove(&4).is_none());
        assert_eq!(preorder(&tree), [2, 1, 3]);

        let mut empty: BsTree<TestNode> = BsTree::new();
        assert!(empty.remove(&0).is_none());
    }

    #[test]
    fn min_max_contains() {
        let tree = build(&[10, 20, 5, 15, 17, 7, 12]);
        assert_eq!(tree.first().map(|node| node.key), Some(5));
        assert_eq!(tree.last().map(|node| node.key), Some(20));
        assert!(tree.contains_key(&15));
        assert!(!tree.contains_key(&99));
    }
}
