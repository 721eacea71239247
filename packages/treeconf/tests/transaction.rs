use std::rc::Rc;

use treeconf::{key, Depth, Generator, Key, MemoryGen, MountTree, TransactionGen, ValueTree};
use treeconf_core::trait_test_suite::DeltaLog;

fn registry() -> Rc<MountTree> {
    let tree = Rc::new(MountTree::new());
    tree.mount(
        &Key::root(),
        MemoryGen::from_pairs([("net/eth0/addr", "10.0.0.1"), ("net/eth0/mask", "24")]),
    );
    tree.mount(&key!("run"), MemoryGen::from_pairs([("pid", "1")]));
    tree
}

fn snapshot(generator: &dyn Generator) -> ValueTree {
    ValueTree::capture(generator, &Key::root()).unwrap_or_default()
}

type Op = (&'static str, Option<&'static str>);

const SCRIPT: &[Op] = &[
    ("net/eth1/addr", Some("10.0.1.1")),
    ("net/eth0/mask", Some("16")),
    ("net/eth0", None),
    ("net/eth0/addr", Some("192.168.0.1")),
    ("run/pid", Some("42")),
    ("run/lock/owner", Some("me")),
    ("Run/Lock", None),
    ("new/leaf", Some("")),
    ("net/eth1", Some("up")),
];

#[test]
fn transaction_over_empty_generator_commits_ancestors() {
    let inner = Rc::new(MemoryGen::new());
    let tx = TransactionGen::new(Rc::clone(&inner));

    tx.set(&key!("x/y"), Some("1"));
    assert!(tx.commit(&Key::root(), Depth::Infinite));
    assert_eq!(inner.get(&key!("x")), Some(String::new()));
    assert_eq!(inner.get(&key!("x/y")), Some("1".to_string()));
}

#[test]
fn transaction_isolates_live_registry() {
    let tree = registry();
    let tx = TransactionGen::new(Rc::clone(&tree));

    tx.set(&key!("net/eth0/addr"), Some("10.9.9.9"));
    tx.set(&key!("run/pid"), None);
    assert_eq!(tx.get(&key!("net/eth0/addr")), Some("10.9.9.9".to_string()));
    assert_eq!(tx.get(&key!("run/pid")), None);
    assert_eq!(tree.get(&key!("net/eth0/addr")), Some("10.0.0.1".to_string()));
    assert_eq!(tree.get(&key!("run/pid")), Some("1".to_string()));
}

#[test]
fn commit_matches_direct_replay() {
    let direct = registry();
    for (key, value) in SCRIPT {
        direct.set(&Key::new(key), *value);
    }

    let tree = registry();
    let tx = TransactionGen::new(Rc::clone(&tree));
    for (key, value) in SCRIPT {
        tx.set(&Key::new(key), *value);
    }
    assert_eq!(snapshot(&tx), snapshot(direct.as_ref()));
    assert!(tx.commit(&Key::root(), Depth::Infinite));

    assert_eq!(snapshot(tree.as_ref()), snapshot(direct.as_ref()));
    assert_eq!(snapshot(&tx), snapshot(tree.as_ref()));
}

#[test]
fn refresh_restores_inner_view() {
    let tree = registry();
    let before = snapshot(tree.as_ref());
    let tx = TransactionGen::new(Rc::clone(&tree));
    for (key, value) in SCRIPT {
        tx.set(&Key::new(key), *value);
    }

    assert!(tx.refresh(&Key::root(), Depth::Infinite));
    assert_eq!(snapshot(&tx), before);
    assert_eq!(snapshot(tree.as_ref()), before);
}

#[test]
fn refresh_is_silent_for_reverted_keys() {
    let tree = registry();
    let tx = TransactionGen::new(Rc::clone(&tree));
    tx.set(&key!("net/eth0/mask"), Some("8"));
    tx.set(&key!("net/eth0/mask"), Some("24"));
    tx.set(&key!("run/pid"), Some("7"));
    tx.set(&key!("run/pid"), Some("1"));

    let log = DeltaLog::attach(&tx);
    tx.refresh(&Key::root(), Depth::Infinite);
    assert!(log.is_empty());
}

#[test]
fn refresh_announces_each_differing_key_once() {
    let tree = registry();
    let tx = TransactionGen::new(Rc::clone(&tree));
    tx.set(&key!("net/eth0/mask"), Some("8"));
    tx.set(&key!("net/eth0/mask"), Some("16"));
    tx.set(&key!("run/pid"), Some("2"));

    let log = DeltaLog::attach(&tx);
    tx.refresh(&Key::root(), Depth::Infinite);
    assert_eq!(
        log.take(),
        vec![
            ("net/eth0/mask".to_string(), Some("24".to_string())),
            ("run/pid".to_string(), Some("1".to_string())),
        ]
    );
}

#[test]
fn registry_changes_show_through_unmasked_keys() {
    let tree = registry();
    let tx = TransactionGen::new(Rc::clone(&tree));
    tx.set(&key!("net/eth0/addr"), Some("pending"));
    let log = DeltaLog::attach(&tx);

    tree.set(&key!("net/eth0/addr"), Some("external"));
    tree.set(&key!("net/eth0/mask"), Some("8"));
    assert_eq!(
        log.take(),
        vec![("net/eth0/mask".to_string(), Some("8".to_string()))]
    );
    assert_eq!(tx.get(&key!("net/eth0/addr")), Some("pending".to_string()));
}

#[test]
fn transaction_can_be_mounted() {
    let backing = Rc::new(MemoryGen::new());
    let tree = MountTree::new();
    tree.mount(&key!("staged"), TransactionGen::new(Rc::clone(&backing)));
    let log = DeltaLog::attach(&tree);

    tree.set(&key!("staged/k"), Some("v"));
    assert_eq!(tree.get(&key!("staged/k")), Some("v".to_string()));
    assert_eq!(backing.get(&key!("k")), None);
    assert_eq!(log.take(), vec![("staged/k".to_string(), Some("v".to_string()))]);

    assert!(tree.commit(&Key::root(), Depth::Infinite));
    assert_eq!(backing.get(&key!("k")), Some("v".to_string()));
    assert!(log.is_empty());
}
