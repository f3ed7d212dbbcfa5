mod common;

use common::{node, path, recorder, summary};
use objerve::{Action, ObserveError, Observer, Value, EACH};
use serde_json::json;

fn seq_listeners(obs: &mut Observer, root: objerve::NodeId) -> common::Log {
    let (f, log) = recorder();
    obs.add_listener(root, vec!["list".into(), EACH], f.clone()).unwrap();
    obs.add_listener(root, ["list", "length"], f).unwrap();
    log
}

#[test]
fn each_matches_every_index_but_not_length() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": [1, 2, 3]})).unwrap();
    let (f, log) = recorder();
    obs.add_listener(root, vec!["list".into(), EACH], f).unwrap();
    let list = node(&obs, root, &["list"]);

    obs.set(list, 1usize, 20).unwrap();
    obs.push(list, 4).unwrap();

    assert_eq!(
        summary(&log),
        vec![
            (Action::Change, path(&["list", "1"]), Some(json!(20)), Some(json!(2))),
            (Action::Create, path(&["list", "3"]), Some(json!(4)), None),
        ]
    );
}

#[test]
fn push_announces_the_new_length_after_the_element() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": [1]})).unwrap();
    let log = seq_listeners(&mut obs, root);
    let list = node(&obs, root, &["list"]);

    obs.push(list, "x").unwrap();

    assert_eq!(
        summary(&log),
        vec![
            (Action::Create, path(&["list", "1"]), Some(json!("x")), None),
            (Action::Change, path(&["list", "length"]), Some(json!(2)), Some(json!(1))),
        ]
    );
}

#[test]
fn truncating_length_deletes_ascending_then_changes_length() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": ["a", "b", "c", "d"]})).unwrap();
    let log = seq_listeners(&mut obs, root);
    let list = node(&obs, root, &["list"]);

    obs.set(list, "length", 1).unwrap();

    assert_eq!(
        summary(&log),
        vec![
            (Action::Delete, path(&["list", "1"]), None, Some(json!("b"))),
            (Action::Delete, path(&["list", "2"]), None, Some(json!("c"))),
            (Action::Delete, path(&["list", "3"]), None, Some(json!("d"))),
            (Action::Change, path(&["list", "length"]), Some(json!(1)), Some(json!(4))),
        ]
    );
    assert_eq!(obs.len(list).unwrap(), 1);
    assert_eq!(obs.to_json(&list.into()).unwrap(), json!(["a"]));
}

#[test]
fn truncation_skips_holes() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": [0, 1, 2]})).unwrap();
    let list = node(&obs, root, &["list"]);
    obs.delete(list, 1usize).unwrap();
    let log = seq_listeners(&mut obs, root);

    obs.set(list, "length", 0).unwrap();

    assert_eq!(
        summary(&log),
        vec![
            (Action::Delete, path(&["list", "0"]), None, Some(json!(0))),
            (Action::Delete, path(&["list", "2"]), None, Some(json!(2))),
            (Action::Change, path(&["list", "length"]), Some(json!(0)), Some(json!(3))),
        ]
    );
}

#[test]
fn extending_length_leaves_holes() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": ["x"]})).unwrap();
    let log = seq_listeners(&mut obs, root);
    let list = node(&obs, root, &["list"]);

    obs.set(list, "length", 3.0).unwrap();

    assert_eq!(
        summary(&log),
        vec![(Action::Change, path(&["list", "length"]), Some(json!(3)), Some(json!(1)))]
    );
    assert_eq!(obs.keys(list).unwrap(), vec!["0".to_string()]);
    assert_eq!(obs.to_json(&list.into()).unwrap(), json!(["x", null, null]));
}

#[test]
fn writing_past_the_end_grows_with_holes() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": []})).unwrap();
    let log = seq_listeners(&mut obs, root);
    let list = node(&obs, root, &["list"]);

    obs.set(list, 2usize, "z").unwrap();

    assert_eq!(
        summary(&log),
        vec![
            (Action::Create, path(&["list", "2"]), Some(json!("z")), None),
            (Action::Change, path(&["list", "length"]), Some(json!(3)), Some(json!(0))),
        ]
    );
    assert_eq!(obs.get(list, "1").unwrap(), None);
    assert!(!obs.contains(list, 1usize).unwrap());
    assert_eq!(obs.keys(list).unwrap(), vec!["2".to_string()]);
    assert_eq!(obs.len(list).unwrap(), 3);
}

#[test]
fn pop_deletes_the_last_element_then_shrinks() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": [1, 2]})).unwrap();
    let log = seq_listeners(&mut obs, root);
    let list = node(&obs, root, &["list"]);

    let popped = obs.pop(list).unwrap();

    assert_eq!(popped, Some(Value::from(2i64)));
    assert_eq!(
        summary(&log),
        vec![
            (Action::Delete, path(&["list", "1"]), None, Some(json!(2))),
            (Action::Change, path(&["list", "length"]), Some(json!(1)), Some(json!(2))),
        ]
    );
}

#[test]
fn pop_on_empty_sequence_is_quiet() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": []})).unwrap();
    let log = seq_listeners(&mut obs, root);
    let list = node(&obs, root, &["list"]);

    assert_eq!(obs.pop(list).unwrap(), None);
    assert!(log.borrow().is_empty());
}

#[test]
fn deleting_an_index_leaves_a_hole_and_keeps_length() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": [1, 2]})).unwrap();
    let log = seq_listeners(&mut obs, root);
    let list = node(&obs, root, &["list"]);

    obs.delete(list, 0usize).unwrap();

    assert_eq!(
        summary(&log),
        vec![(Action::Delete, path(&["list", "0"]), None, Some(json!(1)))]
    );
    assert_eq!(obs.len(list).unwrap(), 2);
    assert_eq!(obs.keys(list).unwrap(), vec!["1".to_string()]);
}

#[test]
fn invalid_sequence_keys_and_lengths_are_rejected() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": [1], "map": {}})).unwrap();
    let log = seq_listeners(&mut obs, root);
    let list = node(&obs, root, &["list"]);
    let map = node(&obs, root, &["map"]);

    assert_eq!(obs.set(list, "name", 1), Err(ObserveError::InvalidKey("name".into())));
    assert_eq!(obs.set(list, "01", 1), Err(ObserveError::InvalidKey("01".into())));
    assert_eq!(obs.delete(list, "length"), Err(ObserveError::InvalidKey("length".into())));
    assert_eq!(obs.set(list, "length", -1), Err(ObserveError::InvalidLength));
    assert_eq!(obs.set(list, "length", 1.5), Err(ObserveError::InvalidLength));
    assert_eq!(obs.set(list, "length", "2"), Err(ObserveError::InvalidLength));
    assert_eq!(obs.push(map, 1), Err(ObserveError::NotSequence));
    assert_eq!(obs.pop(map), Err(ObserveError::NotSequence));

    assert!(log.borrow().is_empty());
    assert_eq!(obs.to_json(&list.into()).unwrap(), json!([1]));
}

#[test]
fn out_of_range_indices_and_lengths_are_rejected_before_notifying() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": [1]})).unwrap();
    let log = seq_listeners(&mut obs, root);
    let (everything, everything_log) = recorder();
    obs.add_prefix_listener(root, Vec::<&str>::new(), everything).unwrap();
    let list = node(&obs, root, &["list"]);
    let past_last = u32::MAX as usize;

    assert_eq!(obs.set(list, usize::MAX, 1), Err(ObserveError::InvalidKey(usize::MAX.to_string())));
    assert_eq!(obs.set(list, past_last, 1), Err(ObserveError::InvalidKey(past_last.to_string())));
    assert_eq!(
        obs.set(list, "18446744073709551616", 1),
        Err(ObserveError::InvalidKey("18446744073709551616".into()))
    );
    assert_eq!(
        obs.set_path(root, ["list", "4294967295"], true),
        Err(ObserveError::InvalidKey("4294967295".into()))
    );
    assert_eq!(obs.set(list, "length", u64::MAX), Err(ObserveError::InvalidLength));
    assert_eq!(obs.set(list, "length", u32::MAX as u64 + 1), Err(ObserveError::InvalidLength));
    assert_eq!(obs.set(list, "length", 1e300), Err(ObserveError::InvalidLength));

    assert!(log.borrow().is_empty());
    assert!(everything_log.borrow().is_empty());
    assert_eq!(obs.len(list).unwrap(), 1);
    assert_eq!(obs.to_json(&list.into()).unwrap(), json!([1]));
}

#[test]
fn sequence_replaced_by_sequence_diffs_elements_and_length() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"list": [1, 2, 3]})).unwrap();
    let log = seq_listeners(&mut obs, root);

    obs.set(root, "list", json!([1, 5])).unwrap();

    assert_eq!(
        summary(&log),
        vec![
            (Action::Change, path(&["list", "1"]), Some(json!(5)), Some(json!(2))),
            (Action::Change, path(&["list", "length"]), Some(json!(2)), Some(json!(3))),
            (Action::Delete, path(&["list", "2"]), None, Some(json!(3))),
        ]
    );
}

#[test]
fn whole_sequence_created_and_removed() {
    let mut obs = Observer::new();
    let root = obs.observe_empty();
    let log = seq_listeners(&mut obs, root);

    obs.set(root, "list", json!([7, 8])).unwrap();
    obs.set(root, "list", json!(null)).unwrap();

    assert_eq!(
        summary(&log),
        vec![
            (Action::Create, path(&["list", "0"]), Some(json!(7)), None),
            (Action::Create, path(&["list", "1"]), Some(json!(8)), None),
            (Action::Create, path(&["list", "length"]), Some(json!(2)), None),
            (Action::Delete, path(&["list", "0"]), None, Some(json!(7))),
            (Action::Delete, path(&["list", "1"]), None, Some(json!(8))),
            (Action::Delete, path(&["list", "length"]), None, Some(json!(2))),
        ]
    );
}

#[test]
fn each_only_matches_canonical_indices() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"m": {"01": 1, "1": 2}})).unwrap();
    let (f, log) = recorder();
    obs.add_listener(root, vec!["m".into(), EACH], f).unwrap();
    let m = node(&obs, root, &["m"]);

    obs.set(m, "01", 5).unwrap();
    obs.set(m, "1", 6).unwrap();

    assert_eq!(
        summary(&log),
        vec![(Action::Change, path(&["m", "1"]), Some(json!(6)), Some(json!(2)))]
    );
}

#[test]
fn nested_each_patterns() {
    let mut obs = Observer::new();
    let root = obs.observe(json!({"rows": [[1, 2], [3]]})).unwrap();
    let (f, log) = recorder();
    obs.add_listener(root, vec!["rows".into(), EACH, EACH], f).unwrap();
    let row = node(&obs, root, &["rows", "1"]);

    obs.push(row, 4).unwrap();
    obs.set(root, "rows", json!([[9]])).unwrap();

    assert_eq!(
        summary(&log),
        vec![
            (Action::Create, path(&["rows", "1", "1"]), Some(json!(4)), None),
            (Action::Change, path(&["rows", "0", "0"]), Some(json!(9)), Some(json!(1))),
            (Action::Delete, path(&["rows", "0", "1"]), None, Some(json!(2))),
            (Action::Delete, path(&["rows", "1", "0"]), None, Some(json!(3))),
            (Action::Delete, path(&["rows", "1", "1"]), None, Some(json!(4))),
        ]
    );
}
