use core::ptr::NonNull;
use std::{collections::VecDeque, fmt};

use crate::{AvlTree, BsTree, Links, TreeNode};

impl<T> BsTree<T>
where
    T: TreeNode<Links<T>>,
    T::Key: fmt::Display,
{
    /// Writes the tree as a Graphviz `digraph`, one rank per level.
    ///
    /// Nodes are labelled with their keys; missing children are drawn as points.
    pub fn dotgraph<W>(&self, name: &str, w: W) -> fmt::Result
    where
        W: fmt::Write,
    {
        self.write_dotgraph(name, w, false)
    }

    pub(crate) fn write_dotgraph<W>(
        &self,
        name: &str,
        mut w: W,
        with_heights: bool,
    ) -> fmt::Result
    where
        W: fmt::Write,
    {
        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        // Nodes are named by position in the breadth-first walk, since keys may repeat.
        enum Item<T: TreeNode<Links<T>>> {
            Node(NonNull<T>, u32),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root, 0));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut nodes = 1;
        let mut missing = 0;
        let mut links = String::new();

        while !queue.is_empty() {
            use fmt::Write;

            write!(w, "{{rank=same; ")?;

            for _ in 0..queue.len() {
                let (node, id) = match queue.pop_front() {
                    Some(Item::Node(node, id)) => (node, id),
                    Some(Item::Missing(id)) => {
                        write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                    None => break,
                };

                let key = unsafe { node.as_ref().key() };
                if with_heights {
                    let height = unsafe { T::links(node).as_ref().height() };
                    write!(w, "\"graph{name}-node{id}\" [label=\"{key}:{height}\"]; ")?;
                } else {
                    write!(w, "\"graph{name}-node{id}\" [label=\"{key}\"]; ")?;
                }

                let children = unsafe {
                    let node_links = T::links(node).as_ref();
                    [node_links.left(), node_links.right()]
                };

                for child in children {
                    if let Some(child) = child {
                        queue.push_back(Item::Node(child, nodes));
                        writeln!(
                            links,
                            "\"graph{name}-node{id}\" -> \"graph{name}-node{nodes}\";"
                        )?;
                        nodes += 1;
                    } else {
                        queue.push_back(Item::Missing(missing));
                        writeln!(
                            links,
                            "\"graph{name}-node{id}\" -> \"graph{name}-missing{missing}\";"
                        )?;
                        missing += 1;
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&links)?;

        w.write_str(" }\n}")
    }
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>>,
    T::Key: fmt::Display,
{
    /// Writes the tree as a Graphviz `digraph`, one rank per level.
    ///
    /// Nodes are labelled `key:height`; missing children are drawn as points.
    pub fn dotgraph<W>(&self, name: &str, w: W) -> fmt::Result
    where
        W: fmt::Write,
    {
        self.tree.write_dotgraph(name, w, true)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::TestNode;

    use super::*;

    #[test]
    fn empty_graph() {
        let tree: AvlTree<TestNode> = AvlTree::new();

        let mut out = String::new();
        tree.dotgraph("empty", &mut out).unwrap();
        assert_eq!(out, "digraph \"graph-empty\" {}");
    }

    #[test]
    fn graph_labels_keys_with_heights() {
        let mut tree: AvlTree<TestNode> = AvlTree::new();
        for key in [1, 2, 3, 4] {
            tree.insert(TestNode::new(key)).unwrap();
        }

        let mut out = String::new();
        tree.dotgraph("t", &mut out).unwrap();

        assert!(out.starts_with("digraph \"graph-t\" {\n subgraph \"subgraph-t\" {"));
        assert!(out.contains("{rank=same; \"grapht-node0\" [label=\"2:2\"]; }\n"));
        assert!(out.contains(
            "\"grapht-node1\" [label=\"1:0\"]; \"grapht-node2\" [label=\"3:1\"]; }\n"
        ));
        assert!(out.contains("\"grapht-node2\" -> \"grapht-node3\";\n"));
        assert!(out.contains("\"grapht-node1\" -> \"grapht-missing0\";\n"));
        assert!(out.ends_with(" }\n}"));
    }

    #[test]
    fn base_graph_labels_keys_only() {
        let mut tree: BsTree<TestNode> = BsTree::new();
        for key in [2, 1, 3, 3] {
            tree.insert(TestNode::new(key));
        }

        let mut out = String::new();
        tree.dotgraph("b", &mut out).unwrap();

        assert!(out.starts_with("digraph \"graph-b\" {\n subgraph \"subgraph-b\" {"));
        assert!(out.contains("{rank=same; \"graphb-node0\" [label=\"2\"]; }\n"));
        assert!(out.contains(
            "\"graphb-node1\" [label=\"1\"]; \"graphb-node2\" [label=\"3\"]; }\n"
        ));
        // The repeated key gets a node of its own.
        assert!(out.contains("\"graphb-node2\" -> \"graphb-node3\";\n"));
        assert!(out.contains("\"graphb-node3\" [label=\"3\"]; }\n"));
        assert!(!out.contains(":0"));
        assert!(out.ends_with(" }\n}"));

        let mut empty = String::new();
        BsTree::<TestNode>::new().dotgraph("none", &mut empty).unwrap();
        assert_eq!(empty, "digraph \"graph-none\" {}");
    }
}
