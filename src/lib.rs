//! An intrusive AVL tree, layered over an unbalanced binary search tree.
//!
//! The crate is organised in two layers:
//!
//! - [`BsTree`] is a plain binary search tree. It links nodes where the ordering says they belong
//!   and never restructures itself, so its height depends on insertion order. Equal keys are
//!   allowed and are placed in the right subtree.
//! - [`AvlTree`] owns a [`BsTree`] and reuses its splice primitives, then walks back up the tree
//!   through parent links to restore the AVL height balance. Equal keys are rejected.
//!
//! Both trees are intrusive: a node type embeds a [`Links`] value and implements
//! [`cordyceps::Linked`] and [`TreeNode`]. [`AvlSet`] and [`BstMultiset`] are owned-value
//! collections built on top of the two trees.
//!
//! ```
//! use cordyceps_avl::{AvlSet, InsertOutcome};
//!
//! let mut set = AvlSet::new();
//! assert_eq!(set.insert(3), InsertOutcome::Inserted);
//! assert_eq!(set.insert(1), InsertOutcome::Inserted);
//! assert_eq!(set.insert(2), InsertOutcome::Inserted);
//! assert_eq!(set.insert(2), InsertOutcome::Duplicate);
//!
//! assert_eq!(set.root(), Some(&2));
//! assert_eq!(set.inorder().copied().collect::<Vec<_>>(), [1, 2, 3]);
//! assert!(set.validate());
//! ```

// Conventions used in comments:
// - The height of a node `x` is denoted `h(x)`. A missing child has height -1, so leaves have
//   height 0 and `h(x) = 1 + max(h(left(x)), h(right(x)))`.
// - The balance factor of `x` is `bf(x) = h(right(x)) - h(left(x))`.
// - `x` is left-heavy if `bf(x) < 0` and right-heavy if `bf(x) > 0`.
//
// The invariants of an AVL tree, which hold whenever a public method returns:
// 1. Every key in the left subtree of `x` is less than `x`'s key, and every key in the right
//    subtree is greater.
// 2. `-1 <= bf(x) <= 1`.
// 3. Stored heights match the formula above.
// 4. Every child's parent link points at the node holding it, and the root has no parent.
//
// `BsTree` only maintains (1), relaxed so that equal keys may appear in the right subtree, and (4).
// Heights stored in a `BsTree`'s links are not meaningful.

use core::{cell::UnsafeCell, fmt, marker::PhantomPinned, mem, ops::Not, ptr::NonNull};

use cordyceps::Linked;

mod avl;
mod base;
mod debug;
mod invariants;
mod iter;
mod set;

#[cfg(any(test, feature = "model"))]
pub mod model;


pub use avl::AvlTree;
pub use base::BsTree;
pub use invariants::InvariantViolation;
pub use iter::{Iter, Preorder};
pub use set::{AvlSet, BstMultiset, InsertOutcome, Values};

/// A node that can be linked into a [`BsTree`] or an [`AvlTree`].
pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    /// Returns the key the node is ordered by.
    ///
    /// The key must not change while the node is linked into a tree.
    fn key(&self) -> &Self::Key;
}

/// Tree links embedded in every node.
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    height: i8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

/// Returns the stored height of the pointed-to node, or -1 for a missing node.
///
/// # Safety
///
/// `link` must be `None` or point to a live node.
#[inline]
unsafe fn height_of<T>(link: Link<T>) -> i8
where
    T: TreeNode<Links<T>> + ?Sized,
{
    link.map(|node| unsafe { T::links(node).as_ref().height() })
        .unwrap_or(-1)
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn height(&self) -> i8 {
        unsafe { (*self.inner.get()).height }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_height(&mut self, height: i8) {
        self.inner.get_mut().height = height;
    }

    // Detaches the links from any tree and resets the height to that of a leaf.
    #[inline]
    fn reset(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.height = 0;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .finish()
    }
}
