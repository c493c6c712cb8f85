use super::*;

fn attach(vm: &Emulator) -> Env {
    vm.attach_current_thread().unwrap()
}

fn boxed_int(vm: &Emulator, env: Env, value: i32) -> ObjectRef {
    let class = vm.find_class(env, "java/lang/Integer").unwrap();
    let ctor = vm.get_method_id(env, class, "<init>", "(I)V").unwrap();
    let obj = vm
        .new_object(env, class, ctor, Some(&[JValue::Int(value).as_jni()]))
        .unwrap();
    vm.delete_local_ref(env, class);
    obj
}

#[test]
fn test_find_class_counts_lookups() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let class = vm.find_class(env, "java/lang/String").unwrap();
    assert_eq!(vm.counters().class_lookups, 1);
    assert_eq!(vm.live_local_refs(), 1);
    vm.delete_local_ref(env, class);
    assert_eq!(vm.live_local_refs(), 0);
}

#[test]
fn test_unknown_class_sets_pending_exception() {
    let vm = Emulator::new();
    let env = attach(&vm);
    assert!(vm.find_class(env, "com/example/Missing").is_none());
    assert!(vm.exception_check(env));
    assert_eq!(
        vm.pending_exception_class(env).as_deref(),
        Some("java/lang/NoClassDefFoundError")
    );
    vm.exception_clear(env);
    assert!(!vm.exception_check(env));
}

#[test]
fn test_boxed_integer_round_trip() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let obj = boxed_int(&vm, env, -42);

    let number = vm.find_class(env, "java/lang/Number").unwrap();
    let int_value = vm.get_method_id(env, number, "intValue", "()I").unwrap();
    let long_value = vm.get_method_id(env, number, "longValue", "()J").unwrap();
    assert_eq!(
        vm.call_method(env, obj, int_value, JavaType::Int, None),
        JValue::Int(-42)
    );
    assert_eq!(
        vm.call_method(env, obj, long_value, JavaType::Long, None),
        JValue::Long(-42)
    );

    let counters = vm.counters();
    assert_eq!(counters.array_layouts, 1);
    assert_eq!(counters.null_layouts, 2);
}

#[test]
fn test_virtual_dispatch_of_to_string() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let obj = boxed_int(&vm, env, 7);
    let object = vm.find_class(env, "java/lang/Object").unwrap();
    let to_string = vm
        .get_method_id(env, object, "toString", "()Ljava/lang/String;")
        .unwrap();
    let JValue::Object(Some(text)) =
        vm.call_method(env, obj, to_string, JavaType::Object, None)
    else {
        panic!("toString returned null");
    };
    let units = vm.get_string_chars(env, text).unwrap();
    assert_eq!(String::from_utf16(&units).unwrap(), "7");
}

#[test]
fn test_constructors_are_not_inherited() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let class = vm.find_class(env, "java/lang/Integer").unwrap();
    assert!(vm.get_method_id(env, class, "<init>", "()V").is_none());
    assert_eq!(
        vm.pending_exception_class(env).as_deref(),
        Some("java/lang/NoSuchMethodError")
    );
    vm.exception_clear(env);
    // Inherited instance methods resolve through the superclass
    assert!(vm.get_method_id(env, class, "intValue", "()I").is_some());
}

#[test]
fn test_thrown_exception_stays_pending() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let integer = vm.find_class(env, "java/lang/Integer").unwrap();
    let parse = vm
        .get_static_method_id(env, integer, "parseInt", "(Ljava/lang/String;)I")
        .unwrap();
    let text = vm.new_string(env, &"x1".encode_utf16().collect::<Vec<_>>()).unwrap();
    let result = vm.call_static_method(
        env,
        integer,
        parse,
        JavaType::Int,
        Some(&[JValue::Object(Some(text)).as_jni()]),
    );
    assert_eq!(result, JValue::Int(0));

    let throwable = vm.exception_occurred(env).unwrap();
    assert_eq!(
        vm.throwable_message(env, throwable).as_deref(),
        Some("For input string: \"x1\"")
    );
    vm.exception_describe(env);
    assert!(!vm.exception_check(env));
    assert_eq!(vm.counters().describes, 1);
}

#[test]
#[should_panic(expected = "pending exception")]
fn test_call_with_pending_exception_aborts() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let _ = vm.find_class(env, "com/example/Missing");
    let _ = vm.find_class(env, "java/lang/String");
}

#[test]
#[should_panic(expected = "local reference table overflow")]
fn test_local_capacity_is_enforced() {
    let vm = Emulator::new().with_local_capacity(2);
    let env = attach(&vm);
    for _ in 0..3 {
        let _ = vm.find_class(env, "java/lang/String");
    }
}

#[test]
#[should_panic(expected = "invalid or deleted reference")]
fn test_double_delete_aborts() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let class = vm.find_class(env, "java/lang/String").unwrap();
    vm.delete_local_ref(env, class);
    vm.delete_local_ref(env, class);
}

#[test]
fn test_env_is_bound_to_its_thread() {
    let vm = Arc::new(Emulator::new());
    let env = attach(&vm);
    let addr = env.addr();
    let other = Arc::clone(&vm);
    let result = std::thread::spawn(move || {
        let env = env_handle(addr);
        other.find_class(env, "java/lang/String").is_some()
    })
    .join();
    assert!(result.is_err());
}

#[test]
fn test_attach_and_detach() {
    let vm = Emulator::new();
    assert_eq!(vm.get_env(), Err(JNI_EDETACHED));
    let env = attach(&vm);
    assert_eq!(vm.get_env(), Ok(env));
    assert_eq!(attach(&vm), env);
    assert_eq!(vm.counters().attaches, 1);

    let _class = vm.find_class(env, "java/lang/String").unwrap();
    assert_eq!(vm.detach_current_thread(), JNI_OK);
    assert_eq!(vm.live_local_refs(), 0);
    assert!(!vm.is_attached());
    assert_eq!(vm.detach_current_thread(), JNI_EDETACHED);

    vm.set_refuse_attach(true);
    assert_eq!(vm.attach_current_thread(), Err(JNI_ERR));
}

#[test]
#[should_panic(expected = "owned by the VM")]
fn test_vm_threads_cannot_be_detached() {
    let vm = Emulator::new();
    vm.adopt_current_thread();
    vm.detach_current_thread();
}

#[test]
fn test_global_refs_outlive_locals() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let local = vm.find_class(env, "java/lang/String").unwrap();
    let global = vm.new_global_ref(env, local).unwrap();
    vm.delete_local_ref(env, local);
    assert_eq!(vm.live_global_refs(), 1);
    assert!(vm.get_method_id(env, global, "toString", "()Ljava/lang/String;").is_some());
    vm.delete_global_ref(env, global);
    assert_eq!(vm.live_global_refs(), 0);
}

#[test]
fn test_class_loader_takes_dotted_names() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let thread = vm.find_class(env, "java/lang/Thread").unwrap();
    let current = vm
        .get_static_method_id(env, thread, "currentThread", "()Ljava/lang/Thread;")
        .unwrap();
    let JValue::Object(Some(me)) =
        vm.call_static_method(env, thread, current, JavaType::Object, None)
    else {
        panic!("no current thread");
    };
    let get_loader = vm
        .get_method_id(env, thread, "getContextClassLoader", "()Ljava/lang/ClassLoader;")
        .unwrap();
    let JValue::Object(Some(loader)) = vm.call_method(env, me, get_loader, JavaType::Object, None)
    else {
        panic!("no loader");
    };
    let loader_class = vm.get_object_class(env, loader).unwrap();
    let load = vm
        .get_method_id(env, loader_class, "loadClass", "(Ljava/lang/String;)Ljava/lang/Class;")
        .unwrap();

    let dotted = vm
        .new_string(env, &"java.util.Date".encode_utf16().collect::<Vec<_>>())
        .unwrap();
    let found = vm.call_method(
        env,
        loader,
        load,
        JavaType::Object,
        Some(&[JValue::Object(Some(dotted)).as_jni()]),
    );
    assert!(matches!(found, JValue::Object(Some(_))));

    let slashed = vm
        .new_string(env, &"java/util/Date".encode_utf16().collect::<Vec<_>>())
        .unwrap();
    let missing = vm.call_method(
        env,
        loader,
        load,
        JavaType::Object,
        Some(&[JValue::Object(Some(slashed)).as_jni()]),
    );
    assert_eq!(missing, JValue::Object(None));
    assert_eq!(
        vm.pending_exception_class(env).as_deref(),
        Some("java/lang/ClassNotFoundException")
    );
    vm.exception_clear(env);
}

#[test]
fn test_user_classes_and_fields() {
    let vm = Emulator::new();
    vm.define_class("com/example/Counter", "java/lang/Object");
    vm.define_field("com/example/Counter", "count", "I");
    vm.define_method("com/example/Counter", "<init>", "(I)V", |ctx| {
        let start = ctx.arg(0);
        ctx.set_field("count", "I", start);
        Ok(Value::Void)
    });

    let env = attach(&vm);
    let class = vm.find_class(env, "com/example/Counter").unwrap();
    let ctor = vm.get_method_id(env, class, "<init>", "(I)V").unwrap();
    let obj = vm
        .new_object(env, class, ctor, Some(&[JValue::Int(5).as_jni()]))
        .unwrap();
    let field = vm.get_field_id(env, class, "count", "I").unwrap();
    assert_eq!(vm.get_field(env, obj, field, JavaType::Int), JValue::Int(5));
    assert_eq!(vm.counters().field_lookups, 1);
}

#[test]
fn test_unreachable_objects_are_collected() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let keep = vm.new_string(env, &[0x61]).unwrap();
    let baseline = vm.live_objects();
    for _ in 0..(GC_THRESHOLD * 2) {
        let s = vm.new_string(env, &[0x62]).unwrap();
        vm.delete_local_ref(env, s);
    }
    assert!(vm.live_objects() < baseline + GC_THRESHOLD * 2);
    assert_eq!(vm.get_string_chars(env, keep), Some(vec![0x61]));
}

#[test]
fn test_big_integer_validates_digits() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let class = vm.find_class(env, "java/math/BigInteger").unwrap();
    let ctor = vm
        .get_method_id(env, class, "<init>", "(Ljava/lang/String;)V")
        .unwrap();

    let text = vm.new_string(env, &"12x".encode_utf16().collect::<Vec<_>>()).unwrap();
    let made = vm.new_object(env, class, ctor, Some(&[JValue::Object(Some(text)).as_jni()]));
    assert!(made.is_none());
    assert_eq!(
        vm.pending_exception_class(env).as_deref(),
        Some("java/lang/NumberFormatException")
    );
    vm.exception_clear(env);

    let text = vm
        .new_string(env, &"18446744073709551615".encode_utf16().collect::<Vec<_>>())
        .unwrap();
    let big = vm
        .new_object(env, class, ctor, Some(&[JValue::Object(Some(text)).as_jni()]))
        .unwrap();
    let number = vm.find_class(env, "java/lang/Number").unwrap();
    let long_value = vm.get_method_id(env, number, "longValue", "()J").unwrap();
    assert_eq!(
        vm.call_method(env, big, long_value, JavaType::Long, None),
        JValue::Long(-1)
    );
}

#[test]
fn test_returning_to_java_frees_locals() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let local = vm.find_class(env, "java/lang/String").unwrap();
    let global = vm.new_global_ref(env, local).unwrap();
    let copy = vm.new_local_ref(env, global).unwrap();
    assert_eq!(vm.live_local_refs(), 2);

    vm.pop_native_frame();

    assert_eq!(vm.live_local_refs(), 0);
    assert_eq!(vm.live_global_refs(), 1);
    let again = vm.new_local_ref(env, global).unwrap();
    assert!(vm.get_method_id(env, again, "toString", "()Ljava/lang/String;").is_some());
    assert_ne!(again, copy);
    vm.delete_local_ref(env, again);
    vm.delete_global_ref(env, global);
}

#[test]
#[should_panic(expected = "invalid or deleted reference")]
fn test_locals_are_stale_after_frame_pop() {
    let vm = Emulator::new();
    let env = attach(&vm);
    let local = vm.find_class(env, "java/lang/String").unwrap();
    vm.pop_native_frame();
    vm.delete_local_ref(env, local);
}
