//! Structural properties of built trees, checked over random shapes

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tinytree::tree::whitespace;
use tinytree::types::{XS_UNTYPED, XS_UNTYPED_ATOMIC};
use tinytree::{Configuration, NodeKind, NodeNr, TinyBuilder, TinyTree};

#[derive(Debug, Clone, Copy)]
enum Op {
    Open(u8),
    Close,
    Text,
    Comment,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..4).prop_map(Op::Open),
        2 => Just(Op::Close),
        2 => Just(Op::Text),
        1 => Just(Op::Comment),
    ]
}

/// A tree plus what the events said it should look like
struct Built {
    tree: TinyTree,
    parents: HashMap<NodeNr, NodeNr>,
    children: HashMap<NodeNr, Vec<NodeNr>>,
    attributes: HashMap<NodeNr, Vec<String>>,
}

fn build(ops: &[Op]) -> Built {
    let mut b = TinyBuilder::new(Arc::new(Configuration::new()));
    let elem = b.tree().names().allocate("", "", "e");
    let att_names: Vec<_> = (0..4)
        .map(|i| b.tree().names().allocate("", "", &format!("a{i}")))
        .collect();

    let mut parents = HashMap::new();
    let mut children: HashMap<NodeNr, Vec<NodeNr>> = HashMap::new();
    let mut attributes = HashMap::new();

    b.start_document();
    let root = b.start_element(elem, XS_UNTYPED, 0);
    b.start_content();
    parents.insert(root, 0);
    children.entry(0).or_default().push(root);
    let mut stack = vec![root];

    for &op in ops {
        let parent = *stack.last().unwrap_or(&root);
        let added = match op {
            Op::Open(atts) => {
                let nr = b.start_element(elem, XS_UNTYPED, 0);
                let values: Vec<String> = (0..atts).map(|k| format!("v{nr}_{k}")).collect();
                for (k, v) in values.iter().enumerate() {
                    b.attribute(att_names[k], XS_UNTYPED_ATOMIC, v, 0);
                }
                b.start_content();
                attributes.insert(nr, values);
                stack.push(nr);
                Some(nr)
            }
            Op::Close => {
                if stack.len() > 1 {
                    stack.pop();
                    b.end_element();
                }
                None
            }
            Op::Text => {
                // Text directly after text at the same level extends that node
                let count = b.tree().node_count() as NodeNr;
                let merges = b.tree().kind(count - 1) == NodeKind::Text
                    && b.tree().depth(count - 1) == b.current_depth();
                b.characters("t", 0);
                (!merges).then_some(count)
            }
            Op::Comment => {
                b.comment("c");
                Some(b.tree().node_count() as NodeNr - 1)
            }
        };
        if let Some(nr) = added {
            parents.insert(nr, parent);
            children.entry(parent).or_default().push(nr);
        }
    }
    while stack.pop().is_some() {
        b.end_element();
    }
    b.end_document();

    Built {
        tree: b.close(),
        parents,
        children,
        attributes,
    }
}

proptest! {
    #[test]
    fn parent_and_sibling_links_agree(ops in prop::collection::vec(op(), 0..120)) {
        let built = build(&ops);
        let tree = &built.tree;
        for (&node, &parent) in &built.parents {
            prop_assert_eq!(tree.parent(node), Some(parent));
            prop_assert_eq!(tree.parent_by_prior(node), Some(parent));
        }
        for (&parent, expected) in &built.children {
            let seen: Vec<NodeNr> = tree.node(parent).children().map(|c| c.nr()).collect();
            prop_assert_eq!(&seen, expected);
            for pair in expected.windows(2) {
                prop_assert_eq!(tree.next_sibling(pair[0]), Some(pair[1]));
                prop_assert_eq!(tree.previous_sibling(pair[1]), Some(pair[0]));
            }
            prop_assert_eq!(tree.previous_sibling(expected[0]), None);
        }
    }

    #[test]
    fn markers_are_never_reached(ops in prop::collection::vec(op(), 0..120)) {
        let built = build(&ops);
        let tree = &built.tree;
        let visible = (0..tree.node_count() as NodeNr)
            .filter(|&n| !tree.kind(n).is_marker())
            .count();
        let reached = tree.node(0).descendants().count() + 1;
        prop_assert_eq!(reached, visible);
        prop_assert!(tree.node(0).descendants().all(|d| !d.kind().is_marker()));
        prop_assert_eq!(tree.kind(tree.node_count() as NodeNr - 1), NodeKind::Stopper);
    }

    #[test]
    fn attributes_stay_with_their_element(ops in prop::collection::vec(op(), 0..120)) {
        let built = build(&ops);
        let tree = &built.tree;
        for (&element, expected) in &built.attributes {
            let seen: Vec<&str> = tree.node(element).attributes().map(|a| a.string_value()).collect();
            prop_assert_eq!(seen, expected.iter().map(String::as_str).collect::<Vec<_>>());
            for a in tree.node(element).attributes() {
                prop_assert_eq!(a.parent().nr(), element);
            }
        }
        let total: usize = built.attributes.values().map(Vec::len).sum();
        prop_assert_eq!(tree.attribute_count(), total);
    }

    #[test]
    fn condensed_capacity_is_bounded(ops in prop::collection::vec(op(), 0..300)) {
        let built = build(&ops);
        let tree = &built.tree;
        prop_assert!(tree.node_capacity() >= tree.node_count());
        prop_assert!(tree.node_capacity() <= 3 * tree.node_count());
    }

    #[test]
    fn whitespace_compression_round_trips(text in "[ \t\n\r]{0,80}") {
        if let Some(packed) = whitespace::compress(&text) {
            prop_assert_eq!(whitespace::expand(packed), text.clone());
            prop_assert_eq!(whitespace::length(packed), text.len());
        }
    }
}
