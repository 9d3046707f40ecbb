//! # Router Module
//!
//! Path matching and route resolution for wayroute.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Building a segment trie from registered patterns (`/users/:id`, `/files/*`)
//! - Resolving request paths to the handler registered for them
//! - Capturing and percent-decoding path parameters
//! - Composing routers by mounting one under a prefix of another
//! - Falling back to a configured default route on a miss
//!
//! ## Precedence
//!
//! At every depth a literal segment beats a capture, so `/foo` wins over
//! `/:x` for the path `/foo` while `/bar` still resolves to `/:x`. The rule is
//! applied per node, not globally, so it holds deep in the tree as well.
//!
//! ## Example
//!
//! ```rust
//! use wayroute::router::{Route, Router};
//!
//! let mut api: Router<&str> = Router::new();
//! api.handle("/users/:id", "get_user");
//!
//! let mut root: Router<&str> = Router::with_default("/404");
//! root.handle("/404", "not_found");
//! root.on("/api", Route::Mount(api));
//!
//! let m = root.match_route("/api/users/7").unwrap();
//! assert_eq!(m.handler, "get_user");
//! assert_eq!(m.params.get("id"), Some("7"));
//!
//! assert_eq!(root.match_route("/nope").unwrap().handler, "not_found");
//! ```

mod core;
mod trie;

pub use core::{ParamVec, Params, Route, RouteMatch, Router, MAX_INLINE_PARAMS};
pub use trie::{Trie, TrieNode, WILDCARD_PARAM};
