//! Byte-keyed radix trie with longest-prefix lookup.
//!
//! Keys are arbitrary byte strings. Each edge carries a non-empty label, and sibling
//! edges never share a first byte, so a lookup walks at most one edge per step and
//! touches each byte of the query once: O(k) in the query length, independent of how
//! many keys are stored.

use std::fmt;

/// A compressed prefix trie mapping byte strings to values.
///
/// ```
/// use rtrie::router::trie::PrefixTrie;
///
/// let mut trie = PrefixTrie::new();
/// trie.insert(b"/api", 1);
/// trie.insert(b"/api/v1", 2);
///
/// assert_eq!(trie.longest_match(b"/api/v1/widgets"), Some((7, &2)));
/// assert_eq!(trie.longest_match(b"/apix"), Some((4, &1)));
/// assert_eq!(trie.longest_match(b"/status"), None);
/// ```
pub struct PrefixTrie<V> {
    root: Node<V>,
    len: usize,
}

struct Node<V> {
    value: Option<V>,
    // Sorted by the first byte of each label.
    edges: Vec<Edge<V>>,
}

struct Edge<V> {
    label: Vec<u8>,
    node: Node<V>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Self {
            value: None,
            edges: Vec::new(),
        }
    }

    fn edge_index(&self, byte: u8) -> Result<usize, usize> {
        self.edges.binary_search_by_key(&byte, |edge| edge.label[0])
    }

    fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        let Some(&first) = key.first() else {
            return self.value.replace(value);
        };

        match self.edge_index(first) {
            Ok(i) => {
                let edge = &mut self.edges[i];
                let common = common_prefix_len(&edge.label, key);
                if common < edge.label.len() {
                    // Split the edge: the shared part stays, the rest moves one level down.
                    let tail = edge.label.split_off(common);
                    let below = std::mem::replace(&mut edge.node, Node::new());
                    edge.node.edges.push(Edge {
                        label: tail,
                        node: below,
                    });
                }
                edge.node.insert(&key[common..], value)
            }
            Err(i) => {
                let mut node = Node::new();
                node.value = Some(value);
                self.edges.insert(
                    i,
                    Edge {
                        label: key.to_vec(),
                        node,
                    },
                );
                None
            }
        }
    }

    fn collect<'a>(&'a self, prefix: &mut Vec<u8>, out: &mut Vec<(Vec<u8>, &'a V)>) {
        if let Some(value) = &self.value {
            out.push((prefix.clone(), value));
        }
        for edge in &self.edges {
            prefix.extend_from_slice(&edge.label);
            edge.node.collect(prefix, out);
            prefix.truncate(prefix.len() - edge.label.len());
        }
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

impl<V> Default for PrefixTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PrefixTrie<V> {
    pub fn new() -> Self {
        Self {
            root: Node::new(),
            len: 0,
        }
    }

    /// Insert `value` under `key`, returning the value it replaced, if any.
    pub fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        let previous = self.root.insert(key, value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Exact-key lookup.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let mut node = &self.root;
        let mut rest = key;
        while let Some(&first) = rest.first() {
            let edge = &node.edges[node.edge_index(first).ok()?];
            rest = rest.strip_prefix(edge.label.as_slice())?;
            node = &edge.node;
        }
        node.value.as_ref()
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Find the longest stored key that is a prefix of `input`.
    ///
    /// Returns the length of that key (so `&input[..len]` is the key and
    /// `&input[len..]` the unmatched rest) together with its value.
    pub fn longest_match(&self, input: &[u8]) -> Option<(usize, &V)> {
        let mut node = &self.root;
        let mut depth = 0;
        let mut best = node.value.as_ref().map(|value| (0, value));

        while let Some(&first) = input.get(depth) {
            let Ok(i) = node.edge_index(first) else {
                break;
            };
            let edge = &node.edges[i];
            if !input[depth..].starts_with(&edge.label) {
                break;
            }
            depth += edge.label.len();
            node = &edge.node;
            if let Some(value) = &node.value {
                best = Some((depth, value));
            }
        }

        best
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All entries in lexicographic key order.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<u8>, &V)> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut Vec::new(), &mut out);
        out.into_iter()
    }
}

impl<V> fmt::Debug for PrefixTrie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(
                self.iter()
                    .map(|(key, _)| String::from_utf8_lossy(&key).into_owned()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie_of(keys: &[&str]) -> PrefixTrie<usize> {
        let mut trie = PrefixTrie::new();
        for (i, key) in keys.iter().enumerate() {
            trie.insert(key.as_bytes(), i);
        }
        trie
    }

    #[test]
    fn empty_trie_matches_nothing() {
        let trie: PrefixTrie<()> = PrefixTrie::new();
        assert!(trie.is_empty());
        assert_eq!(trie.longest_match(b"/anything"), None);
        assert_eq!(trie.longest_match(b""), None);
    }

    #[test]
    fn longest_of_several_candidates_wins() {
        let trie = trie_of(&["/api", "/api/v1"]);
        assert_eq!(trie.longest_match(b"/api/v1/widgets"), Some((7, &1)));
        assert_eq!(trie.longest_match(b"/api/v2"), Some((4, &0)));
        assert_eq!(trie.longest_match(b"/ap"), None);
    }

    #[test]
    fn match_is_bytewise_not_segmentwise() {
        let trie = trie_of(&["/user"]);
        assert_eq!(trie.longest_match(b"/users/7"), Some((5, &0)));
    }

    #[test]
    fn exact_key_leaves_empty_rest() {
        let trie = trie_of(&["/update"]);
        assert_eq!(trie.longest_match(b"/update"), Some((7, &0)));
    }

    #[test]
    fn inserting_a_shorter_key_splits_an_edge() {
        let mut trie = trie_of(&["/status/live"]);
        trie.insert(b"/status", 9);
        trie.insert(b"/stats", 10);
        assert_eq!(trie.len(), 3);
        assert_eq!(trie.get(b"/status"), Some(&9));
        assert_eq!(trie.get(b"/status/live"), Some(&0));
        assert_eq!(trie.get(b"/stats"), Some(&10));
        assert_eq!(trie.get(b"/stat"), None);
        assert_eq!(trie.longest_match(b"/status/ready"), Some((7, &9)));
    }

    #[test]
    fn reinsert_replaces_and_keeps_len() {
        let mut trie = PrefixTrie::new();
        assert_eq!(trie.insert(b"/a", "first"), None);
        assert_eq!(trie.insert(b"/a", "second"), Some("first"));
        assert_eq!(trie.len(), 1);
        assert_eq!(trie.longest_match(b"/a/b"), Some((2, &"second")));
    }

    #[test]
    fn empty_key_is_a_catch_all() {
        let mut trie = trie_of(&["/x"]);
        trie.insert(b"", 5);
        assert_eq!(trie.longest_match(b"/y"), Some((0, &5)));
        assert_eq!(trie.longest_match(b"/x/1"), Some((2, &0)));
    }

    #[test]
    fn non_utf8_keys_are_fine() {
        let mut trie = PrefixTrie::new();
        trie.insert(&[0xff, 0x00, 0x80], 1);
        assert_eq!(trie.longest_match(&[0xff, 0x00, 0x80, 0x01]), Some((3, &1)));
    }

    #[test]
    fn iter_is_sorted() {
        let trie = trie_of(&["/b", "/a/2", "/a", "/a/1"]);
        let keys: Vec<String> = trie
            .iter()
            .map(|(k, _)| String::from_utf8(k).unwrap())
            .collect();
        assert_eq!(keys, ["/a", "/a/1", "/a/2", "/b"]);
    }
}
