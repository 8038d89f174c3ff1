use core::{iter::FusedIterator, ptr::NonNull};

use crate::{BsTree, Dir, Link, Links, TreeNode};

enum CameFrom {
    Parent,
    LeftChild,
    Here,
    RightChild,
}

/// An iterator over the nodes of a tree in ascending key order.
///
/// Created by [`BsTree::iter`] and [`AvlTree::iter`](crate::AvlTree::iter). The iterator follows
/// parent links, so it needs no stack regardless of the tree's height.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    tree: &'tree BsTree<T>,

    cur: Link<T>,
    from: CameFrom,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree BsTree<T>) -> Self {
        Iter {
            tree,

            cur: tree.root,
            from: CameFrom::Parent,
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        let mut cur = self.cur?;

        loop {
            match self.from {
                CameFrom::Parent => {
                    // Upon entering a new subtree, find the minimum element.
                    while let Some(left) = unsafe { T::links(cur).as_ref().left() } {
                        cur = left;
                    }

                    // Once the minimum is found, its (empty) left subtree has been exhausted.
                    self.from = CameFrom::LeftChild;
                }

                CameFrom::LeftChild => {
                    // The left subtree has been exhausted, so this node is up next. Save off the
                    // iterator state and return it.
                    self.cur = Some(cur);
                    self.from = CameFrom::Here;

                    return Some(unsafe { cur.as_ref() });
                }

                CameFrom::Here => {
                    // The current node was just yielded.
                    match unsafe { T::links(cur).as_ref().right() } {
                        // If the right subtree is not empty, go there.
                        Some(right) => {
                            self.from = CameFrom::Parent;
                            cur = right;
                        }

                        // Otherwise the right subtree is trivially exhausted.
                        None => self.from = CameFrom::RightChild,
                    }
                }

                CameFrom::RightChild => {
                    // Ascend until we arrive from a left child; that parent is the successor.
                    loop {
                        let Some(parent) = (unsafe { T::links(cur).as_ref().parent() }) else {
                            // Climbed out of the root's right subtree.
                            self.cur = None;
                            return None;
                        };

                        let dir = unsafe { self.tree.which_child(parent, cur) };
                        cur = parent;

                        if dir == Dir::Left {
                            self.from = CameFrom::LeftChild;
                            break;
                        }
                    }
                }
            }
        }
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'_, T> {}

/// An iterator over the nodes of a tree in pre-order.
///
/// Created by [`BsTree::preorder`] and [`AvlTree::preorder`](crate::AvlTree::preorder). Pending
/// right subtrees are kept on an explicit stack.
pub struct Preorder<'tree, T: TreeNode<Links<T>> + ?Sized> {
    _tree: &'tree BsTree<T>,

    stack: Vec<NonNull<T>>,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Preorder<'tree, T> {
    pub(crate) fn new(tree: &'tree BsTree<T>) -> Self {
        Preorder {
            _tree: tree,

            stack: tree.root.into_iter().collect(),
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Preorder<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;

        unsafe {
            let links = T::links(node).as_ref();
            self.stack.extend(links.right());
            self.stack.extend(links.left());

            Some(node.as_ref())
        }
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Preorder<'_, T> {}
