//! Integration tests for per-thread environments

mod common;

use javelin_core::{BridgeError, ThreadKey};
use std::collections::HashSet;
use std::sync::Barrier;
use std::thread;

#[test]
fn test_attaches_once_per_thread() {
    let (vm, bridge) = common::bridge();
    assert!(!vm.is_attached());

    let first = bridge.env().unwrap().raw();
    let second = bridge.env().unwrap().raw();

    assert_eq!(first, second);
    assert!(vm.is_attached());
    assert_eq!(vm.counters().attaches, 1);
    assert_eq!(bridge.registry().len(), 1);
    assert_eq!(bridge.registry().lookup(ThreadKey::current()), Some(first));
}

#[test]
fn test_thread_exit_detaches_owned_environment() {
    let (vm, bridge) = common::bridge();
    bridge.env().unwrap();

    bridge.thread_exited();

    assert!(!vm.is_attached());
    assert_eq!(vm.counters().detaches, 1);
    assert!(bridge.registry().is_empty());

    // Exiting twice is harmless
    bridge.thread_exited();
    assert_eq!(vm.counters().detaches, 1);

    // And the next call attaches again
    bridge.env().unwrap();
    assert_eq!(vm.counters().attaches, 2);
}

#[test]
fn test_vm_owned_thread_is_borrowed() {
    let (vm, bridge) = common::bridge();
    let adopted = vm.adopt_current_thread();

    let env = bridge.env().unwrap();
    assert_eq!(env.raw(), adopted);
    drop(env);
    assert_eq!(vm.counters().attaches, 0);

    // Detaching a VM-owned thread would panic inside the emulator
    bridge.thread_exited();
    assert_eq!(vm.counters().detaches, 0);
    assert!(vm.is_attached());
    assert!(bridge.registry().is_empty());
}

#[test]
fn test_seed_current_thread() {
    let (vm, bridge) = common::bridge();

    let err = bridge.seed_current_thread().unwrap_err();
    assert!(matches!(err, BridgeError::AttachmentFailure { .. }));
    assert!(bridge.registry().is_empty());

    let adopted = vm.adopt_current_thread();
    bridge.seed_current_thread().unwrap();
    assert_eq!(bridge.registry().lookup(ThreadKey::current()), Some(adopted));

    bridge.thread_exited();
    assert_eq!(vm.counters().detaches, 0);
}

#[test]
fn test_refused_attach_reports_caller() {
    let (vm, bridge) = common::bridge();
    vm.set_refuse_attach(true);

    let err = bridge.env().unwrap_err();
    match &err {
        BridgeError::AttachmentFailure { code, location } => {
            assert_ne!(*code, 0);
            assert!(location.file().ends_with("registry_test.rs"), "{location}");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("registry_test.rs"));
    assert!(bridge.registry().is_empty());

    vm.set_refuse_attach(false);
    bridge.env().unwrap();
    assert_eq!(vm.counters().attaches, 1);
}

#[test]
fn test_each_thread_gets_its_own_environment() {
    let (vm, bridge) = common::shared_bridge();
    let threads = 4;
    let barrier = Barrier::new(threads);

    // Env handles are !Send, so compare their addresses as text
    let envs: HashSet<String> = thread::scope(|s| {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    let env = format!("{:?}", bridge.env().unwrap().raw());
                    // Everyone is attached at the same time
                    barrier.wait();
                    assert_eq!(bridge.registry().len(), threads);
                    barrier.wait();
                    bridge.thread_exited();
                    env
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(envs.len(), threads);
    assert_eq!(vm.counters().attaches, threads);
    assert_eq!(vm.counters().detaches, threads);
    assert!(bridge.registry().is_empty());
}

#[test]
fn test_thread_exit_callback() {
    let (vm, bridge) = common::shared_bridge();
    let on_exit = bridge.thread_exit_callback();

    let worker = bridge.clone();
    thread::spawn(move || {
        worker.env().unwrap().class("java/lang/String").unwrap();
        on_exit();
    })
    .join()
    .unwrap();

    assert_eq!(vm.counters().detaches, 1);
    assert!(bridge.registry().is_empty());
    // Handles outlive the thread that resolved them
    assert!(bridge.handles().cached_class("java/lang/String").is_some());
}
