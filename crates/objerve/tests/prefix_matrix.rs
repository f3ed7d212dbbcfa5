mod common;

use common::{actions, node, path, recorder, summary, tagged, tags};
use objerve::{Action, ObserveError, Observer, PatternError, Segment, EACH, TREE};
use serde_json::json;

#[test]
fn prefix_listener_sees_the_whole_subtree_in_walk_order() {
    let mut obs = Observer::new();
    let root = obs.observe_empty();
    let (f, log) = recorder();
    obs.add_prefix_listener(root, ["a"], f).unwrap();

    obs.set(root, "a", json!({"b": {"c": 1}, "d": [true]})).unwrap();
    obs.delete(root, "a").unwrap();

    let create = [
        vec!["a"],
        vec!["a", "b"],
        vec!["a", "b", "c"],
        vec!["a", "d"],
        vec!["a", "d", "0"],
        vec!["a", "d", "length"],
    ];
    let delete = [
        vec!["a", "b", "c"],
        vec!["a", "b"],
        vec!["a", "d", "0"],
        vec!["a", "d", "length"],
        vec!["a", "d"],
        vec!["a"],
    ];
    let expected: Vec<_> = create
        .iter()
        .map(|p| (Action::Create, path(p)))
        .chain(delete.iter().map(|p| (Action::Delete, path(p))))
        .collect();
    assert_eq!(actions(&log), expected);
}

#[test]
fn root_prefix_listener_sees_every_write() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"x": {"y": 1}})).unwrap();
    let (f, log) = recorder();
    obs.add_prefix_listener(root, Vec::<&str>::new(), f).unwrap();
    let x = node(&obs, root, &["x"]);

    obs.set(root, "a", 1).unwrap();
    obs.set(x, "y", 2).unwrap();

    assert_eq!(
        summary(&log),
        vec![
            (Action::Create, path(&["a"]), Some(json!(1)), None),
            (Action::Change, path(&["x", "y"]), Some(json!(2)), Some(json!(1))),
        ]
    );
}

#[test]
fn exact_patterns_run_before_prefix_patterns() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"a": {}})).unwrap();
    let order = tags();
    obs.add_prefix_listener(root, Vec::<&str>::new(), tagged(&order, "root tree")).unwrap();
    obs.add_prefix_listener(root, ["a"], tagged(&order, "a tree")).unwrap();
    obs.add_listener(root, vec![Segment::from("a"), EACH], tagged(&order, "each")).unwrap();
    obs.add_listener(root, ["a", "1"], tagged(&order, "exact")).unwrap();
    let a = node(&obs, root, &["a"]);

    obs.set(a, "1", true).unwrap();

    assert_eq!(*order.borrow(), vec!["exact", "each", "a tree", "root tree"]);
}

#[test]
fn listeners_on_one_pattern_run_in_registration_order() {
    let mut obs = Observer::new();
    let root = obs.observe_empty();
    let order = tags();
    for tag in ["first", "second", "third"] {
        obs.add_listener(root, ["k"], tagged(&order, tag)).unwrap();
    }

    obs.set(root, "k", 0).unwrap();

    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn interior_targets_see_relative_paths() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"a": {"b": {}}})).unwrap();
    let a = node(&obs, root, &["a"]);
    let b = node(&obs, root, &["a", "b"]);
    let (exact, exact_log) = recorder();
    let (prefix, prefix_log) = recorder();
    obs.add_listener(a, ["b", "x"], exact).unwrap();
    obs.add_prefix_listener(b, Vec::<&str>::new(), prefix).unwrap();

    obs.set(b, "x", 1).unwrap();

    let exact_calls = exact_log.borrow();
    assert_eq!(exact_calls.len(), 1);
    assert_eq!(exact_calls[0].path, path(&["b", "x"]));
    assert_eq!(exact_calls[0].target, a);
    let prefix_calls = prefix_log.borrow();
    assert_eq!(prefix_calls.len(), 1);
    assert_eq!(prefix_calls[0].path, path(&["x"]));
    assert_eq!(prefix_calls[0].target, b);
}

#[test]
fn interior_registrations_are_removed_through_the_same_target() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"a": {"b": {}}})).unwrap();
    let a = node(&obs, root, &["a"]);
    let b = node(&obs, root, &["a", "b"]);
    let (f, log) = recorder();
    obs.add_listener(a, ["b", "x"], f.clone()).unwrap();

    obs.remove_listener(root, ["a", "b", "x"], &f).unwrap();
    obs.set(b, "x", 1).unwrap();
    assert_eq!(log.borrow().len(), 1, "removal through the root must not match");

    obs.remove_listener(a, ["b", "x"], &f).unwrap();
    obs.set(b, "x", 2).unwrap();
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn interior_prefix_listener_sees_its_own_replacement() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"a": {"b": 1}})).unwrap();
    let a = node(&obs, root, &["a"]);
    let (f, log) = recorder();
    obs.add_prefix_listener(a, Vec::<&str>::new(), f).unwrap();

    obs.set(root, "a", json!({"b": 2})).unwrap();

    let calls = log.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!((calls[0].action, calls[0].path.clone()), (Action::Change, path(&[])));
    assert_eq!((calls[1].action, calls[1].path.clone()), (Action::Change, path(&["b"])));
}

#[test]
fn prefix_listener_is_removed() {
    let mut obs = Observer::new();
    let root = obs.observe_empty();
    let (f, log) = recorder();
    obs.add_prefix_listener(root, ["a"], f.clone()).unwrap();

    obs.set(root, "a", 1).unwrap();
    obs.remove_prefix_listener(root, ["a"], &f).unwrap();
    obs.set(root, "a", 2).unwrap();

    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn prefix_under_each() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"items": [{"n": 1}, {"n": 2}]})).unwrap();
    let (f, log) = recorder();
    obs.add_listener(root, vec![Segment::from("items"), EACH, TREE], f).unwrap();
    let second = node(&obs, root, &["items", "1"]);

    obs.set(second, "n", 3).unwrap();
    obs.set(root, "title", "ignored").unwrap();

    assert_eq!(actions(&log), vec![(Action::Change, path(&["items", "1", "n"]))]);
}

#[test]
fn tree_must_be_last() {
    let mut obs = Observer::new();
    let root = obs.observe_empty();
    let (f, _) = recorder();

    assert_eq!(
        obs.add_listener(root, vec![TREE, Segment::from("a")], f.clone()),
        Err(ObserveError::InvalidPath(PatternError::TreeNotLast { position: 0 }))
    );
    assert_eq!(
        obs.add_prefix_listener(root, vec![TREE], f),
        Err(ObserveError::InvalidPath(PatternError::TreeNotLast { position: 0 }))
    );
}

#[test]
fn registering_on_a_detached_node_fails() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"a": {}})).unwrap();
    let a = node(&obs, root, &["a"]);
    obs.delete(root, "a").unwrap();
    let (f, _) = recorder();

    assert_eq!(obs.add_listener(a, ["x"], f), Err(ObserveError::InvalidTarget));
}
