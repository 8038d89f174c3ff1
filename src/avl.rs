use core::{borrow::Borrow, pin::Pin, ptr::NonNull};

use tracing::trace;

use crate::{
    base::{Duplicates, Slot},
    height_of,
    iter::{Iter, Preorder},
    BsTree, Dir, Link, Links, TreeNode,
};

/// An intrusive AVL tree.
///
/// Splicing nodes in and out is delegated to an inner [`BsTree`]; afterwards the tree is walked
/// from the point of change up to the root, recomputing heights and rotating wherever a balance
/// factor leaves `-1..=1`. Search, insertion and removal are _O(log(n))_ in the worst case.
///
/// Keys are unique: inserting a key that is already present hands the item back.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) tree: BsTree<T>,
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree {
            tree: BsTree::new(),
        }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the tree.
    ///
    /// The tree keeps no counter, so this walks every node.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the tree, or `None` if the tree is empty.
    ///
    /// A tree with a single element has height 0.
    pub fn height(&self) -> Option<usize> {
        let root = self.tree.root?;
        let height = unsafe { T::links(root).as_ref().height() };

        usize::try_from(height).ok()
    }

    /// Returns the root node of the tree.
    #[inline]
    pub fn root(&self) -> Option<Pin<&T>> {
        self.tree.root()
    }

    /// Returns a reference to the node corresponding to `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key)
    }

    /// Returns `true` if the tree contains a node with a key equal to `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns the minimum element of the tree.
    #[inline]
    pub fn first(&self) -> Option<Pin<&T>> {
        self.tree.first()
    }

    /// Returns the maximum element of the tree.
    #[inline]
    pub fn last(&self) -> Option<Pin<&T>> {
        self.tree.last()
    }

    /// Returns an iterator over the nodes of the tree in ascending key order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        self.tree.iter()
    }

    /// Returns an iterator over the nodes of the tree in pre-order.
    #[inline]
    pub fn preorder(&self) -> Preorder<'_, T> {
        self.tree.preorder()
    }

    /// Clears the tree, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains a node with an equal key, the tree is left unchanged and the
    /// item is returned in `Err`.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Result<(), T::Handle> {
        let ptr = T::into_ptr(item);
        let key = unsafe { ptr.as_ref().key() };

        let insert_as = match self.tree.find_slot(key, Duplicates::Reject) {
            Slot::Vacant(insert_as) => insert_as,
            Slot::Occupied(_) => {
                trace!(?key, "duplicate key rejected");
                return Err(unsafe { T::from_ptr(ptr) });
            }
        };

        unsafe {
            self.tree.link_at(ptr, insert_as);

            // If the new leaf has a sibling, its parent was already height 1 and nothing above it
            // changes.
            if self.tree.sibling(ptr).is_none() {
                let parent = T::links(ptr).as_ref().parent();
                self.rebalance_upward(parent);
            }
        }

        Ok(())
    }

    /// Removes the node corresponding to `key` from the tree and returns it.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.tree.get_raw(key)?;

        unsafe {
            // Unlike insertion, a removal may need a rotation at every level up to the root.
            let change_point = self.tree.unlink(node);
            self.rebalance_upward(change_point);

            Some(T::from_ptr(node))
        }
    }

    // Rebalancing ============================================================

    // Rebalances `opt_node` and each of its ancestors, ending at the root.
    unsafe fn rebalance_upward(&mut self, mut opt_node: Link<T>) {
        while let Some(node) = opt_node {
            unsafe {
                let subtree_root = self.rebalance(node);
                opt_node = T::links(subtree_root).as_ref().parent();
            }
        }
    }

    // Restores `-1 <= bf(node) <= 1`, assuming both children are valid AVL subtrees whose heights
    // differ by at most 2. Returns the root of the rebalanced subtree.
    unsafe fn rebalance(&mut self, node: NonNull<T>) -> NonNull<T> {
        unsafe {
            let heavy = match self.balance_factor(node) {
                ..=-2 => Dir::Left,
                2.. => Dir::Right,
                _ => {
                    self.update_height(node);
                    return node;
                }
            };

            let child = T::links(node)
                .as_ref()
                .child(heavy)
                .expect("the heavy side of an unbalanced node must be present");

            // A child leaning away from the heavy side is first rotated towards it (the LR and RL
            // cases). A balanced child takes the single rotation.
            if self.leans(child, !heavy) {
                self.rotate(child, heavy);
            }

            self.rotate(node, !heavy)
        }
    }

    // Performs a rotation moving `down` one level down in direction `dir`; its `!dir` child moves
    // up into its place and is returned.
    //
    // `rotate(x, Dir::Left)` is a left rotation: `x` must be right-heavy and pivots on its right
    // child. `rotate(x, Dir::Right)` is the mirror image.
    unsafe fn rotate(&mut self, down: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let up = T::links(down)
                .as_ref()
                .child(!dir)
                .expect("rotation pivot must be present");

            trace!(
                ?dir,
                key = ?down.as_ref().key(),
                pivot = ?up.as_ref().key(),
                "rotate"
            );

            // - `down` becomes the `dir` child of `up`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let across = T::links(up).as_ref().child(dir);
            T::links(down).as_mut().set_child(!dir, across);
            self.tree.maybe_set_parent(across, Some(down));

            let parent = T::links(down).as_ref().parent();
            self.tree.replace_child_or_set_root(parent, down, Some(up));
            T::links(up).as_mut().set_parent(parent);

            T::links(up).as_mut().set_child(dir, Some(down));
            T::links(down).as_mut().set_parent(Some(up));

            // Children before parents.
            self.update_height(down);
            self.update_height(up);

            up
        }
    }

    // Support methods ========================================================

    #[inline]
    unsafe fn balance_factor(&self, node: NonNull<T>) -> i8 {
        unsafe {
            let links = T::links(node).as_ref();
            height_of(links.right()) - height_of(links.left())
        }
    }

    #[inline]
    unsafe fn leans(&self, node: NonNull<T>, dir: Dir) -> bool {
        let balance = unsafe { self.balance_factor(node) };

        match dir {
            Dir::Left => balance < 0,
            Dir::Right => balance > 0,
        }
    }

    #[inline]
    unsafe fn update_height(&mut self, node: NonNull<T>) {
        unsafe {
            let height = {
                let links = T::links(node).as_ref();
                1 + height_of(links.left()).max(height_of(links.right()))
            };

            T::links(node).as_mut().set_height(height);
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::TestNode;

    use super::*;

    fn build(keys: &[u32]) -> AvlTree<TestNode> {
        let mut tree = AvlTree::new();
        for &key in keys {
            assert!(tree.insert(TestNode::new(key)).is_ok());
            tree.assert_invariants();
        }
        tree
    }

    fn preorder(tree: &AvlTree<TestNode>) -> Vec<u32> {
        tree.preorder().map(|node| node.key).collect()
    }

    fn heights(tree: &AvlTree<TestNode>) -> Vec<i8> {
        tree.preorder()
            .map(|node| node.links.height())
            .collect()
    }

    #[test]
    fn single_left_rotation() {
        let tree = build(&[1, 2, 3]);
        assert_eq!(preorder(&tree), [2, 1, 3]);
        assert_eq!(heights(&tree), [1, 0, 0]);
    }

    #[test]
    fn single_right_rotation() {
        let tree = build(&[3, 2, 1]);
        assert_eq!(preorder(&tree), [2, 1, 3]);
    }

    #[test]
    fn right_left_rotation() {
        let tree = build(&[1, 3, 2]);
        assert_eq!(preorder(&tree), [2, 1, 3]);
    }

    #[test]
    fn left_right_rotation() {
        let tree = build(&[3, 1, 2]);
        assert_eq!(preorder(&tree), [2, 1, 3]);
        assert_eq!(heights(&tree), [1, 0, 0]);
    }

    #[test]
    fn insertion_rotation_sequences() {
        assert_eq!(preorder(&build(&[10, 20, 30, 40, 50])), [20, 10, 40, 30, 50]);
        assert_eq!(preorder(&build(&[10, 20, 30, 50, 40])), [20, 10, 40, 30, 50]);
        assert_eq!(preorder(&build(&[30, 20, 10, 5, 1])), [20, 5, 1, 10, 30]);
        assert_eq!(preorder(&build(&[30, 20, 10, 1, 5])), [20, 5, 1, 10, 30]);
        assert_eq!(preorder(&build(&[5, 4, 6, 3, 7, 2, 8])), [5, 3, 2, 4, 7, 6, 8]);
    }

    #[test]
    fn duplicate_is_handed_back() {
        let mut tree = build(&[2, 1, 3]);
        let before = preorder(&tree);

        let rejected = tree.insert(TestNode::new(3)).expect_err("3 is already present");
        assert_eq!(rejected.key, 3);
        assert_eq!(preorder(&tree), before);
        tree.assert_invariants();
    }

    #[test]
    fn remove_without_rotation() {
        for (key, expected) in [
            (1, &[2, 3][..]),
            (2, &[3, 1][..]),
            (3, &[2, 1][..]),
        ] {
            let mut tree = build(&[1, 2, 3]);
            assert_eq!(tree.remove(&key).map(|node| node.key), Some(key));
            tree.assert_invariants();
            assert_eq!(preorder(&tree), expected);
        }
    }

    #[test]
    fn remove_with_single_rotation() {
        let mut rr = build(&[50, 40, 60, 30, 70, 20, 80, 45]);
        assert_eq!(preorder(&rr), [50, 30, 20, 40, 45, 70, 60, 80]);
        rr.remove(&20);
        rr.assert_invariants();
        assert_eq!(preorder(&rr), [50, 40, 30, 45, 70, 60, 80]);

        let mut ll = build(&[50, 40, 60, 30, 70, 20, 80, 15]);
        ll.remove(&40);
        ll.assert_invariants();
        assert_eq!(preorder(&ll), [50, 20, 15, 30, 70, 60, 80]);
    }

    #[test]
    fn remove_with_double_rotation() {
        let mut rl = build(&[50, 40, 60, 30, 70, 20, 80, 35]);
        rl.remove(&20);
        rl.assert_invariants();
        assert_eq!(preorder(&rl), [50, 35, 30, 40, 70, 60, 80]);

        let mut lr = build(&[50, 40, 60, 30, 70, 20, 80, 25]);
        lr.remove(&40);
        lr.assert_invariants();
        assert_eq!(preorder(&lr), [50, 25, 20, 30, 70, 60, 80]);
    }

    #[test]
    fn remove_rebalances_at_root() {
        let mut tree = build(&[10, 20, 30, 40, 50]);
        assert_eq!(tree.remove(&10).map(|node| node.key), Some(10));
        tree.assert_invariants();

        assert_eq!(preorder(&tree), [40, 20, 30, 50]);
        assert_eq!(
            tree.iter().map(|node| node.key).collect::<Vec<_>>(),
            [20, 30, 40, 50]
        );
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
        assert_eq!(tree.height(), None);
    }
}
