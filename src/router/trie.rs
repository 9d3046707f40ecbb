//! Segment trie used to resolve request paths to registered handlers
//!
//! Paths are split on `/` (one leading slash stripped) and each segment is one
//! level of the tree. A node holds:
//!
//! - literal children keyed by exact segment text
//! - at most one capture child, reached when no literal child matches
//! - the capture declaration (`param_name`) for that capture child, and
//!   whether the capture swallows the rest of the path (`wildcard`)
//!
//! Precedence is decided independently at every node: a literal child always
//! wins over the capture child at the same depth. Segments beginning with `:`
//! declare a single-segment capture, segments beginning with `*` declare a
//! capture of the remaining path. A bare `*` captures under
//! [`WILDCARD_PARAM`].
//!
//! ## Example
//!
//! ```rust
//! use wayroute::router::Trie;
//!
//! let mut trie: Trie<&str> = Trie::new();
//! trie.create("/users/:id").set_handler("get_user", "/users/:id");
//! trie.create("/files/*").set_handler("get_file", "/files/*");
//!
//! let (node, params) = trie.match_path("/users/42");
//! assert_eq!(node.and_then(|n| n.handler()), Some(&"get_user"));
//! assert_eq!(params.get("id"), Some("42"));
//!
//! let (_, params) = trie.match_path("/files/a/b/c");
//! assert_eq!(params.get("wildcard"), Some("a/b/c"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::core::Params;

/// Parameter name bound by a bare `*` segment
pub const WILDCARD_PARAM: &str = "wildcard";

/// One path segment of the trie.
pub struct TrieNode<H> {
    /// Literal children keyed by exact segment text
    children: HashMap<String, TrieNode<H>>,
    /// Single capture child shared by every capturing segment at this node
    param_child: Option<Box<TrieNode<H>>>,
    /// The capture child swallows all remaining segments
    wildcard: bool,
    /// Name bound by the capture child; `None` means no capture is declared
    param_name: Option<Arc<str>>,
    /// Present only on nodes that terminate a registered route
    handler: Option<H>,
    /// Pattern the route was registered with
    route: Arc<str>,
}

impl<H> Default for TrieNode<H> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            param_child: None,
            wildcard: false,
            param_name: None,
            handler: None,
            route: Arc::from(""),
        }
    }
}

impl<H> TrieNode<H> {
    /// Handler attached to this node, if a route terminates here
    #[must_use]
    pub fn handler(&self) -> Option<&H> {
        self.handler.as_ref()
    }

    /// Pattern the terminating route was registered with (empty otherwise)
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Capture name declared at this node
    #[must_use]
    pub fn param_name(&self) -> Option<&str> {
        self.param_name.as_deref()
    }

    /// Whether the capture declared here binds the remainder of the path
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.wildcard && self.param_name.is_some()
    }

    /// Literal child for `segment`
    #[must_use]
    pub fn child(&self, segment: &str) -> Option<&TrieNode<H>> {
        self.children.get(segment)
    }

    /// Capture child, if any capturing segment was registered at this node
    #[must_use]
    pub fn param_child(&self) -> Option<&TrieNode<H>> {
        self.param_child.as_deref()
    }

    /// Attach a handler and the pattern it was registered with
    pub fn set_handler(&mut self, handler: H, route: &str) {
        self.handler = Some(handler);
        self.route = Arc::from(route);
    }

    /// Walk one segment down from this node, creating the child when needed
    fn extend(&mut self, segment: &str) -> &mut TrieNode<H> {
        let Some((name, wildcard)) = capture(segment) else {
            return self.children.entry(segment.to_owned()).or_default();
        };

        if let Some(existing) = self.param_name.as_deref() {
            if existing != name || self.wildcard != wildcard {
                // Every capture at a node shares one slot; the newest declaration wins.
                warn!(
                    previous = %existing,
                    replacement = %name,
                    wildcard = wildcard,
                    "Capture redeclared at the same trie depth"
                );
            }
        }
        self.param_name = Some(Arc::from(name));
        self.wildcard = wildcard;
        &mut **self.param_child.get_or_insert_with(Box::default)
    }

    fn collect_routes(&self, out: &mut Vec<String>) {
        if self.handler.is_some() {
            out.push(self.route.to_string());
        }
        for child in self.children.values() {
            child.collect_routes(out);
        }
        if let Some(child) = &self.param_child {
            child.collect_routes(out);
        }
    }
}

/// Path-segment trie.
///
/// Owns no knowledge of HTTP; the handler type `H` is opaque.
pub struct Trie<H> {
    root: TrieNode<H>,
}

impl<H> Default for Trie<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Trie<H> {
    /// Create an empty trie
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: TrieNode::default(),
        }
    }

    /// Root node of the tree
    #[must_use]
    pub fn root(&self) -> &TrieNode<H> {
        &self.root
    }

    /// Give up the tree, returning its root (used when mounting)
    #[must_use]
    pub fn into_root(self) -> TrieNode<H> {
        self.root
    }

    /// Walk and extend the tree for `pattern`, returning the terminal node.
    ///
    /// The caller attaches the handler and pattern with
    /// [`TrieNode::set_handler`].
    pub fn create(&mut self, pattern: &str) -> &mut TrieNode<H> {
        let mut node = &mut self.root;
        for segment in split_path(pattern) {
            node = node.extend(segment);
        }
        node
    }

    /// Resolve `path`, returning the reached node and the captured params.
    ///
    /// Returns `None` for the node when the walk fails: no literal child and
    /// no capture at some depth, a capture without a child to descend into,
    /// or a segment that is not valid percent-encoding. Params bound before
    /// the failure are still returned so a default-route lookup can use them.
    #[must_use]
    pub fn match_path(&self, path: &str) -> (Option<&TrieNode<H>>, Params) {
        let segments: Vec<&str> = split_path(path).collect();
        let mut params = Params::new();
        let mut node = &self.root;
        let mut index = 0;

        while let Some(&segment) = segments.get(index) {
            if let Some(child) = node.children.get(segment) {
                node = child;
                index += 1;
                continue;
            }

            let Some(name) = node.param_name.as_ref() else {
                return (None, params);
            };

            if node.wildcard {
                let rest = segments[index..].join("/");
                let Some(value) = decode_segment(&rest) else {
                    debug!(segment = %rest, "Undecodable wildcard remainder");
                    return (None, params);
                };
                params.insert(Arc::clone(name), value);
                return (node.param_child.as_deref(), params);
            }

            let Some(value) = decode_segment(segment) else {
                debug!(segment = %segment, "Undecodable path segment");
                return (None, params);
            };
            params.insert(Arc::clone(name), value);

            match node.param_child.as_deref() {
                Some(child) => node = child,
                None => return (None, params),
            }
            index += 1;
        }

        (Some(node), params)
    }

    /// Patterns of every route registered in the tree
    #[must_use]
    pub fn routes(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_routes(&mut out);
        out.sort();
        out.dedup();
        out
    }
}

impl<H: Clone> Trie<H> {
    /// Graft `subtree` under a node created for `prefix`.
    ///
    /// The subtree root's literal children and capture declaration are moved
    /// onto the mount node. If the subtree had a route registered at `/`
    /// (its empty-segment child), that node's handler, pattern and capture are
    /// promoted onto the mount node and its children are moved up, since the
    /// mounted `/` is otherwise only reachable with a trailing slash. The
    /// empty-segment child is kept, childless, so `prefix/` still resolves.
    pub fn mount(&mut self, prefix: &str, subtree: TrieNode<H>) {
        let TrieNode {
            children,
            param_child,
            wildcard,
            param_name,
            handler,
            route,
        } = subtree;

        let node = self.create(prefix);
        node.children.extend(children);
        if param_name.is_some() {
            node.param_name = param_name;
            node.wildcard = wildcard;
            node.param_child = param_child;
        }
        if let Some(handler) = handler {
            node.handler = Some(handler);
            node.route = route;
        }

        let Some(mut index) = node.children.remove("") else {
            return;
        };
        let grandchildren = std::mem::take(&mut index.children);
        if index.param_name.is_some() {
            node.param_name = index.param_name.take();
            node.wildcard = std::mem::take(&mut index.wildcard);
            node.param_child = index.param_child.take();
        }
        if let Some(handler) = &index.handler {
            node.handler = Some(handler.clone());
            node.route = Arc::clone(&index.route);
            node.children.insert(String::new(), index);
        }
        for (segment, child) in grandchildren {
            node.children.entry(segment).or_insert(child);
        }
    }
}

/// Split a pattern or path into segments, stripping one leading slash
fn split_path(path: &str) -> std::str::Split<'_, char> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

/// Recognize a capturing segment, returning its name and wildcard flag
fn capture(segment: &str) -> Option<(&str, bool)> {
    if let Some(name) = segment.strip_prefix(':') {
        return Some((name, false));
    }
    let name = segment.strip_prefix('*')?;
    Some((if name.is_empty() { WILDCARD_PARAM } else { name }, true))
}

/// Strictly percent-decode one path segment.
///
/// Returns `None` for a `%` not followed by two hex digits or for bytes that
/// do not decode to UTF-8.
pub(crate) fn decode_segment(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    urlencoding::decode(raw).ok().map(|s| s.into_owned())
}
