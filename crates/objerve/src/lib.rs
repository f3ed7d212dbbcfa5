//! Observable trees of maps and sequences.
//!
//! An [`Observer`] owns any number of trees. Listeners register on a tree
//! under a path pattern and are told about every create, change and delete
//! that touches a matching path, however the mutation happened: a single
//! field write, a whole subtree replaced at once, a sequence truncated, or a
//! change inside another tree that is referenced from this one.
//!
//! All listener calls caused by one outside mutation, including the ones
//! caused by mutations the listeners make themselves, share one
//! [`TxId`].
//!
//! # Example
//!
//! ```
//! use objerve::{Action, Listener, Observer, EACH};
//! use serde_json::json;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let mut observer = Observer::new();
//! let root = observer.observe(json!({ "todos": [] })).unwrap();
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = log.clone();
//! let listener = Listener::new(move |_, change| {
//!     sink.borrow_mut().push((change.action, change.path.join("/")));
//! });
//! observer
//!     .add_listener(root, vec!["todos".into(), EACH, "done".into()], listener)
//!     .unwrap();
//!
//! let todos = observer.get(root, "todos").unwrap().and_then(|v| v.as_node()).unwrap();
//! observer.push(todos, json!({ "title": "write docs", "done": false })).unwrap();
//! observer.set_path(root, ["todos", "0", "done"], true).unwrap();
//! observer.pop(todos).unwrap();
//!
//! assert_eq!(
//!     *log.borrow(),
//!     vec![
//!         (Action::Create, "todos/0/done".to_string()),
//!         (Action::Change, "todos/0/done".to_string()),
//!         (Action::Delete, "todos/0/done".to_string()),
//!     ]
//! );
//! ```

mod arena;
pub mod config;
mod cross_ref;
mod differ;
pub mod error;
mod matcher;
mod node;
mod notifier;
mod observer;
mod registry;
pub mod value;

pub use config::ObserverConfig;
pub use error::ObserveError;
pub use objerve_path::{Key, Path, Pattern, PatternError, Segment, EACH, TREE};
pub use observer::Observer;
pub use registry::{Action, Change, Listener};
pub use value::{Input, IntoKey, NodeId, TxId, Value};
