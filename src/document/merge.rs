//! Values File Merging
//!
//! Deep-merges parsed documents in order. Later documents win for scalar and
//! sequence values, and the replaced entry takes its comments with it.
//! Mappings merge key by key, with the later key's comments winning slot by
//! slot.

use std::mem;

use super::{Node, NodeKind};

/// Merge documents left to right, skipping empty ones
pub fn merge(documents: impl IntoIterator<Item = Node>) -> Node {
    documents
        .into_iter()
        .filter(|doc| !doc.is_empty_document())
        .fold(None, |merged: Option<Node>, doc| match merged {
            None => Some(doc),
            Some(base) => Some(merge_nodes(base, doc)),
        })
        .unwrap_or_default()
}

/// Merge `overlay` into `base`
pub fn merge_nodes(mut base: Node, overlay: Node) -> Node {
    if !(base.is_mapping() && overlay.is_mapping()) {
        return overlay;
    }
    base.inherit_comments(&overlay);

    let NodeKind::Mapping(overlay_pairs) = overlay.kind else {
        return base;
    };
    if let NodeKind::Mapping(pairs) = &mut base.kind {
        merge_pairs(pairs, overlay_pairs);
    }
    base
}

fn merge_pairs(pairs: &mut Vec<(Node, Node)>, overlay_pairs: Vec<(Node, Node)>) {
    for (key, value) in overlay_pairs {
        match pairs.iter().position(|(k, _)| k.same_key(&key)) {
            Some(index) => {
                let (base_key, base_value) = &mut pairs[index];
                if base_value.is_mapping() && value.is_mapping() {
                    base_key.inherit_comments(&key);
                    let current = mem::take(base_value);
                    *base_value = merge_nodes(current, value);
                } else {
                    // the later entry replaces the earlier one, comments included
                    *base_key = key;
                    *base_value = value;
                }
            }
            None => pairs.push((key, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_str;
    use super::*;

    fn keys(node: &Node) -> Vec<&str> {
        match &node.kind {
            NodeKind::Mapping(pairs) => pairs.iter().filter_map(|(k, _)| k.text()).collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_merge_overrides_and_extends() {
        let base = parse_str("a:\n  x: 1\n  y: 2\nb: 1\n").unwrap();
        let overlay = parse_str("a:\n  y: 3\n  z: 4\nc: 5\n").unwrap();
        let merged = merge([base, overlay]);

        assert_eq!(keys(&merged), vec!["a", "b", "c"]);
        let a = merged.get("a").unwrap();
        assert_eq!(keys(a), vec!["x", "y", "z"]);
        assert_eq!(a.get("y").unwrap().text(), Some("3"));
    }

    #[test]
    fn test_merge_replaces_non_mappings() {
        let base = parse_str("list: [1, 2]\nmap:\n  k: v\n").unwrap();
        let overlay = parse_str("list: [3]\nmap: none\n").unwrap();
        let merged = merge([base, overlay]);

        assert!(merged.get("list").unwrap().is_sequence());
        assert_eq!(merged.get("map").unwrap().text(), Some("none"));
    }

    #[test]
    fn test_merge_replacement_drops_old_comments() {
        let base =
            parse_str("# @schema required: true\nport: 80 # @schema minimum: 1\nname: web # keep\n")
                .unwrap();
        let overlay = parse_str("port: 8080\nname: api # new\n").unwrap();
        let merged = merge([base, overlay]);

        let NodeKind::Mapping(pairs) = &merged.kind else {
            panic!("expected mapping");
        };
        assert_eq!(pairs[0].1.text(), Some("8080"));
        assert!(pairs[0].0.head_comment.is_empty());
        assert!(pairs[0].1.line_comment.is_empty());
        assert_eq!(pairs[1].1.line_comment, "# new");
    }

    #[test]
    fn test_merge_mapping_key_comments_later_wins() {
        let base = parse_str("# @schema title: Base\nimage: # @schema required: true\n  tag: a\n")
            .unwrap();
        let overlay = parse_str("# @schema title: Overlay\nimage:\n  tag: b\n").unwrap();
        let merged = merge([base, overlay]);

        let NodeKind::Mapping(pairs) = &merged.kind else {
            panic!("expected mapping");
        };
        assert_eq!(pairs[0].0.head_comment, "# @schema title: Overlay");
        assert_eq!(pairs[0].0.line_comment, "# @schema required: true");
        assert_eq!(merged.get("image").unwrap().get("tag").unwrap().text(), Some("b"));
    }

    #[test]
    fn test_merge_skips_empty_documents() {
        let base = parse_str("a: 1\n").unwrap();
        let empty = parse_str("# nothing here\n").unwrap();
        let merged = merge([base, empty]);
        assert_eq!(merged.get("a").unwrap().text(), Some("1"));

        let merged = merge(Vec::<Node>::new());
        assert!(merged.is_empty_document());
    }
}
