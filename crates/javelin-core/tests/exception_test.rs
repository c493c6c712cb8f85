//! Integration tests for exception capture, draining and raising

mod common;

use javelin_core::javelin_sys::emulator::Value;
use javelin_core::javelin_sys::JNI_OK;
use javelin_core::{Arg, BridgeConfig, BridgeError, JniEnv};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn parse_int(env: &JniEnv<'_>, text: &str) -> i32 {
    let integer = env.class("java/lang/Integer").unwrap();
    let parse = env
        .static_method("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I")
        .unwrap();
    env.call_static(&integer, &parse, &[Arg::Str(text)])
}

#[test]
fn test_drain_with_nothing_pending() {
    let (_vm, bridge) = common::bridge();
    let env = bridge.env().unwrap();

    assert!(env.take_exception().is_none());
    assert!(env.take_exception().is_none());
    assert_eq!(parse_int(&env, "8"), 8);
    assert!(env.take_exception().is_none());
    assert!(env.rethrow().is_ok());
}

#[test]
fn test_raised_exception_is_drained_once() {
    let (vm, bridge) = common::bridge();
    let env = bridge.env().unwrap();

    assert_eq!(parse_int(&env, "x"), 0);
    // Parked, not left in the VM
    assert_eq!(vm.pending_exception_class(env.raw()), None);
    assert!(env.has_pending_exception());

    let throwable = env.take_exception().unwrap();
    assert_eq!(
        env.class_name_of(throwable.as_obj()).unwrap(),
        "java/lang/NumberFormatException"
    );
    assert_eq!(
        vm.throwable_message(env.raw(), throwable.as_obj()).as_deref(),
        Some("For input string: \"x\"")
    );
    assert!(env.take_exception().is_none());
}

#[test]
fn test_exception_does_not_leak_into_next_call() {
    let (vm, bridge) = common::bridge();
    let env = bridge.env().unwrap();
    let locals = vm.live_local_refs();

    parse_int(&env, "x");
    assert_eq!(parse_int(&env, "3"), 3);

    assert!(env.take_exception().is_none());
    // The leftover throwable was released when the second call started
    assert_eq!(vm.live_local_refs(), locals);
}

#[test]
fn test_parked_exception_survives_return_to_java() {
    let (vm, bridge) = common::bridge();
    let env = bridge.env().unwrap();
    parse_int(&env, "0");
    env.method("java/lang/Class", "getName", "()Ljava/lang/String;")
        .unwrap();
    let globals = vm.live_global_refs();

    parse_int(&env, "x");
    // The native method returns; the VM frees every local of its frame
    vm.pop_native_frame();
    assert_eq!(vm.live_local_refs(), 0);

    let throwable = env.take_exception().unwrap();
    assert_eq!(
        env.class_name_of(throwable.as_obj()).unwrap(),
        "java/lang/NumberFormatException"
    );
    drop(throwable);
    assert_eq!(vm.live_global_refs(), globals);

    // A leftover from an earlier frame is discarded without touching locals
    parse_int(&env, "y");
    vm.pop_native_frame();
    assert_eq!(parse_int(&env, "5"), 5);
    assert!(!env.has_pending_exception());
    assert_eq!(vm.live_global_refs(), globals);
    assert_eq!(vm.live_local_refs(), 0);
}

#[test]
fn test_rethrow() {
    let (_vm, bridge) = common::bridge();
    let env = bridge.env().unwrap();

    parse_int(&env, "x");
    let err = env.rethrow().unwrap_err();
    match &err {
        BridgeError::PendingException { class, message } => {
            assert_eq!(class, "java/lang/NumberFormatException");
            assert_eq!(message.as_deref(), Some("For input string: \"x\""));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "java/lang/NumberFormatException: For input string: \"x\""
    );
    assert!(env.rethrow().is_ok());
}

#[test]
fn test_exceptions_are_per_thread() {
    let (_vm, bridge) = common::shared_bridge();
    let env = bridge.env().unwrap();
    parse_int(&env, "x");

    let worker = bridge.clone();
    thread::spawn(move || {
        {
            let env = worker.env().unwrap();
            assert!(!env.has_pending_exception());
            assert_eq!(parse_int(&env, "21"), 21);
        }
        worker.thread_exited();
    })
    .join()
    .unwrap();

    assert!(env.take_exception().is_some());
}

#[test]
fn test_capture_overwrites_undrained_exception() {
    let (vm, bridge) = common::bridge();
    let env = bridge.env().unwrap();
    let exceptions = bridge.exceptions();
    let locals = vm.live_local_refs();

    let class = env.class("java/lang/IllegalStateException").unwrap();
    let globals = vm.live_global_refs();
    for message in ["first", "second"] {
        assert_eq!(
            bridge.native().throw_new(env.raw(), class.as_obj(), message),
            JNI_OK
        );
        assert!(exceptions.capture(env.raw(), env.thread()));
    }

    let kept = env.take_exception().unwrap();
    assert_eq!(
        vm.throwable_message(env.raw(), kept.as_obj()).as_deref(),
        Some("second")
    );
    assert!(env.take_exception().is_none());
    drop(kept);
    assert_eq!(vm.live_local_refs(), locals);
    // The overwritten throwable was released too
    assert_eq!(vm.live_global_refs(), globals);
}

#[test]
fn test_describe_exceptions() {
    let (vm, bridge) = common::bridge_with(BridgeConfig::new().describe_exceptions(true));
    let env = bridge.env().unwrap();

    parse_int(&env, "x");
    assert_eq!(vm.counters().describes, 1);
    assert!(env.take_exception().is_some());

    let (vm, bridge) = common::bridge();
    let env = bridge.env().unwrap();
    parse_int(&env, "x");
    assert_eq!(vm.counters().describes, 0);
}

#[test]
fn test_throw_error_raises_into_the_vm() {
    let (vm, bridge) = common::bridge();
    let env = bridge.env().unwrap();

    env.throw_error(&BridgeError::ClassNotFound("com/example/Gone".into()))
        .unwrap();
    assert_eq!(
        vm.pending_exception_class(env.raw()).as_deref(),
        Some("java/lang/Exception")
    );

    assert!(bridge.exceptions().capture(env.raw(), env.thread()));
    let err = env.rethrow().unwrap_err();
    assert!(matches!(
        err,
        BridgeError::PendingException { ref class, ref message }
            if class == "java/lang/Exception"
                && message.as_deref() == Some("ClassNotFound: com/example/Gone")
    ));
}

#[test]
fn test_throw_new_unknown_class() {
    let (vm, bridge) = common::bridge();
    let env = bridge.env().unwrap();

    let err = env.throw_new("com/example/NoSuchError", "boom").unwrap_err();
    assert!(matches!(err, BridgeError::ClassNotFound(_)));
    assert_eq!(vm.pending_exception_class(env.raw()), None);
}

#[test]
fn test_class_name_of() {
    let (_vm, bridge) = common::bridge();
    let env = bridge.env().unwrap();

    let text = env.to_foreign("hello").unwrap();
    assert_eq!(env.class_name_of(text.as_obj()).unwrap(), "java/lang/String");
    let boxed = env.to_foreign(&1.5f64).unwrap();
    assert_eq!(env.class_name_of(boxed.as_obj()).unwrap(), "java/lang/Double");
}

#[test]
fn test_dump_reference_tables() {
    let (vm, bridge) = common::bridge();
    let env = bridge.env().unwrap();

    let err = env.dump_reference_tables().unwrap_err();
    assert!(matches!(err, BridgeError::ClassNotFound(ref name) if name == "dalvik/system/VMDebug"));
    assert_eq!(vm.pending_exception_class(env.raw()), None);

    let dumps = Arc::new(AtomicUsize::new(0));
    let seen = dumps.clone();
    vm.define_class("dalvik/system/VMDebug", "java/lang/Object");
    vm.define_static_method("dalvik/system/VMDebug", "dumpReferenceTables", "()V", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Void)
    });

    env.dump_reference_tables().unwrap();
    assert_eq!(dumps.load(Ordering::SeqCst), 1);
}

#[test]
fn test_pending_exception_dropped_on_thread_exit() {
    let (vm, bridge) = common::shared_bridge();

    let worker = bridge.clone();
    let key = thread::spawn(move || {
        let key = {
            let env = worker.env().unwrap();
            parse_int(&env, "x");
            assert!(env.has_pending_exception());
            env.thread()
        };
        worker.thread_exited();
        key
    })
    .join()
    .unwrap();

    assert!(!bridge.exceptions().has_pending(key));
    assert_eq!(vm.counters().detaches, 1);
    assert_eq!(vm.live_local_refs(), 0);
}
