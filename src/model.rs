//! Reference-model equivalence harness, shared by the test suite and the fuzz targets.

use std::{collections::BTreeSet, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlTree, BsTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(r))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Contains(ItemValue),
    Remove(ItemValue),
    First,
    Last,
    Clear,
}

impl Op {
    // Resolves `Index` values against the keys currently in the tree, so that lookups and
    // removals hit present keys as often as missing ones.
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Contains(item) => FinalOp::Contains(get_value(sorted, item)),
            Op::Remove(item) => FinalOp::Remove(get_value(sorted, item)),
            Op::First => FinalOp::First,
            Op::Last => FinalOp::Last,
            Op::Clear => FinalOp::Clear,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Contains(u32),
    Remove(u32),
    First,
    Last,
    Clear,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        4 => value_strategy().prop_map(Op::Insert),
        2 => value_strategy().prop_map(Op::Contains),
        3 => value_strategy().prop_map(Op::Remove),
        1 => Just(Op::First),
        1 => Just(Op::Last),
        // Rare, so that trees get a chance to grow.
        1 => Just(Op::Clear),
    ]
}

/// Returns the largest height an AVL tree with `len` nodes can have.
pub fn avl_height_bound(len: usize) -> f64 {
    1.44 * ((len + 2) as f64).log2() - 1.0
}

#[inline]
fn ref_key(node: core::pin::Pin<&TestNode>) -> u32 {
    node.key
}

#[inline]
#[allow(clippy::boxed_local)]
fn node_key(node: Box<TestNode>) -> u32 {
    node.key
}

/// Runs `ops` against an [`AvlTree`] and a [`BTreeSet`], asserting they agree after every step
/// and that the tree's invariants and height bound hold.
pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut btree = BTreeSet::new();
    let mut avl: AvlTree<TestNode> = AvlTree::new();

    for (op_id, op) in ops.into_iter().enumerate() {
        let sorted_values: Vec<u32> = btree.iter().copied().collect();
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(value) => {
                let from_btree = btree.insert(value);
                let from_avl = avl.insert(TestNode::new(value));

                match from_avl {
                    Ok(()) => assert!(from_btree, "FinalOp #{op_id}: {final_op:?}"),
                    Err(rejected) => {
                        assert!(!from_btree, "FinalOp #{op_id}: {final_op:?}");
                        assert_eq!(rejected.key, value);
                    }
                }
            }

            FinalOp::Contains(value) => {
                let from_btree = btree.contains(&value);
                let from_avl = avl.contains_key(&value);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(value) => {
                let from_btree = btree.remove(&value).then_some(value);
                let from_avl = avl.remove(&value).map(node_key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::First => {
                let from_btree = btree.first().copied();
                let from_avl = avl.first().map(ref_key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Last => {
                let from_btree = btree.last().copied();
                let from_avl = avl.last().map(ref_key);

                assert_eq!(from_btree, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Clear => {
                btree.clear();
                avl.clear();
            }
        }

        avl.assert_invariants();
        assert_eq!(btree.len(), avl.len());
        assert!(btree.iter().eq(avl.iter().map(|node| &node.key)));

        if let Some(height) = avl.height() {
            assert!(
                height as f64 <= avl_height_bound(btree.len()),
                "height {height} too large for {} nodes",
                btree.len()
            );
        }
    }
}

/// Runs `ops` against a [`BsTree`] and a sorted `Vec` holding the same multiset of keys.
pub fn run_multiset_equivalence(ops: Vec<Op>) {
    let mut sorted_values: Vec<u32> = Vec::with_capacity(ops.len());
    let mut bst: BsTree<TestNode> = BsTree::new();

    fn insert_sorted(v: &mut Vec<u32>, value: u32) {
        let idx = v.partition_point(|&x| x <= value);
        v.insert(idx, value);
    }

    fn remove_sorted(v: &mut Vec<u32>, value: u32) -> bool {
        match v.binary_search(&value) {
            Ok(idx) => {
                v.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(value) => {
                insert_sorted(&mut sorted_values, value);
                bst.insert(TestNode::new(value));
            }

            FinalOp::Contains(value) => {
                let from_vec = sorted_values.binary_search(&value).is_ok();
                let from_bst = bst.contains_key(&value);

                assert_eq!(from_vec, from_bst, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(value) => {
                let from_vec = remove_sorted(&mut sorted_values, value).then_some(value);
                let from_bst = bst.remove(&value).map(node_key);

                assert_eq!(from_vec, from_bst, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::First => {
                let from_vec = sorted_values.first().copied();
                let from_bst = bst.first().map(ref_key);

                assert_eq!(from_vec, from_bst, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Last => {
                let from_vec = sorted_values.last().copied();
                let from_bst = bst.last().map(ref_key);

                assert_eq!(from_vec, from_bst, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Clear => {
                sorted_values.clear();
                bst.clear();
            }
        }

        bst.assert_invariants();
        assert_eq!(sorted_values.len(), bst.len());
        assert!(sorted_values.iter().eq(bst.iter().map(|node| &node.key)));
    }
}
