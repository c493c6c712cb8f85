//! Process-wide installation and the load hook
//!
//! The installed bridge is a process global, so everything touching it
//! lives in one test.

mod common;

use javelin_core::javelin_sys::{JNI_ERR, JavaVM};
use javelin_core::{Bridge, BridgeConfig, BridgeError, UriBinding, on_load};
use std::ptr;

#[test]
fn test_install_and_load_hook() {
    common::init_tracing();
    assert!(Bridge::global().is_none());

    // Failed loads never install anything
    let status = unsafe { on_load(ptr::null_mut::<JavaVM>(), BridgeConfig::default()) };
    assert_eq!(status, JNI_ERR);
    let bad = BridgeConfig::new().uri(UriBinding {
        factory: String::new(),
        ..UriBinding::default()
    });
    let status = unsafe { on_load(ptr::null_mut::<JavaVM>(), bad) };
    assert_eq!(status, JNI_ERR);
    assert!(Bridge::global().is_none());

    let (_vm, bridge) = common::bridge();
    let installed = bridge.install().unwrap();
    assert!(ptr::eq(installed, Bridge::global().unwrap()));

    let (_vm, second) = common::bridge();
    assert!(matches!(second.install(), Err(BridgeError::AlreadyInstalled)));
    assert!(ptr::eq(installed, Bridge::global().unwrap()));

    let env = installed.env().unwrap();
    assert_eq!(env.class("java/lang/String").unwrap().name(), "java/lang/String");
}
