#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use objerve::{Action, Change, Listener, NodeId, Observer, TxId, Value};
use serde_json::Value as Json;

/// One listener call, with values materialized at call time.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub action: Action,
    pub path: Vec<String>,
    pub new: Option<Json>,
    pub old: Option<Json>,
    pub target: NodeId,
    pub tx: TxId,
}

pub type Log = Rc<RefCell<Vec<Call>>>;

fn snapshot(obs: &Observer, value: &Option<Value>) -> Option<Json> {
    value
        .as_ref()
        .map(|v| obs.to_json(v).unwrap_or_else(|_| Json::String("<cycle>".into())))
}

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn recorder() -> (Listener, Log) {
    let log = new_log();
    (recorder_into(&log), log)
}

/// A fresh listener appending to an existing log.
pub fn recorder_into(log: &Log) -> Listener {
    let sink = Rc::clone(log);
    Listener::new(move |obs: &mut Observer, change: &Change| {
        let call = Call {
            action: change.action,
            path: change.path.clone(),
            new: snapshot(obs, &change.new_value),
            old: snapshot(obs, &change.old_value),
            target: change.target,
            tx: change.transaction,
        };
        sink.borrow_mut().push(call);
    })
}

pub type Tags = Rc<RefCell<Vec<&'static str>>>;

pub fn tags() -> Tags {
    Rc::new(RefCell::new(Vec::new()))
}

/// A listener that only records `tag`.
pub fn tagged(tags: &Tags, tag: &'static str) -> Listener {
    let sink = Rc::clone(tags);
    Listener::new(move |_, _| sink.borrow_mut().push(tag))
}

pub fn path(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

/// `(action, path, new, old)` of every call, in order.
pub fn summary(log: &Log) -> Vec<(Action, Vec<String>, Option<Json>, Option<Json>)> {
    log.borrow()
        .iter()
        .map(|c| (c.action, c.path.clone(), c.new.clone(), c.old.clone()))
        .collect()
}

/// `(action, path)` of every call, in order.
pub fn actions(log: &Log) -> Vec<(Action, Vec<String>)> {
    log.borrow().iter().map(|c| (c.action, c.path.clone())).collect()
}

/// The container stored at `keys` below `root`.
pub fn node(obs: &Observer, root: NodeId, keys: &[&str]) -> NodeId {
    obs.get_path(root, keys.iter().copied())
        .expect("live root")
        .and_then(|v| v.as_node())
        .unwrap_or_else(|| panic!("no container at {keys:?}"))
}
