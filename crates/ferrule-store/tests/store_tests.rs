//! Integration tests for the store module
//!
//! Tests cover:
//! - Module open and namespace layout
//! - Store methods called by name
//! - BinaryCache inheriting and overriding Store methods
//! - Receiver checks between the two classes

use ferrule_sdk::{ScriptError, ScriptRuntime, Value};
use ferrule_store::{open, StoreConfig, MODULE_NAME};
use ferrule_vm::Vm;

fn construct(vm: &mut Vm, class: &str, args: &[Value]) -> Result<Value, ScriptError> {
    let namespace = vm.get_global(MODULE_NAME);
    let constructor = vm.get_field(&namespace, class)?;
    let object = vm.call(&constructor, args)?.remove(0);
    vm.pin(object.clone());
    Ok(object)
}

fn open_vm(config: StoreConfig) -> Vm {
    let mut vm = Vm::default();
    open(&mut vm, config).unwrap();
    vm
}

#[test]
fn test_namespace() {
    let mut vm = Vm::default();
    let (_bridge, namespace) = open(&mut vm, StoreConfig::default()).unwrap();

    assert_eq!(vm.get_global(MODULE_NAME), namespace);
    assert!(vm.get_field(&namespace, "Store").unwrap().as_function().is_some());
    assert!(vm.get_field(&namespace, "BinaryCache").unwrap().as_function().is_some());
    assert_eq!(
        vm.get_field(&namespace, "version").unwrap().as_str(),
        Some(env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn test_store_uri() {
    let mut vm = open_vm(StoreConfig::default().without_default_uri());
    let unnamed = construct(&mut vm, "Store", &[]).unwrap();
    let named = construct(&mut vm, "Store", &["daemon".into()]).unwrap();

    assert_eq!(vm.call_method(&unnamed, "get_uri", &[]).unwrap(), vec![Value::Nil]);
    assert_eq!(vm.call_method(&named, "get_uri", &[]).unwrap(), vec![Value::from("daemon")]);
}

#[test]
fn test_configured_default_uri() {
    let mut vm = open_vm(StoreConfig::default().with_default_uri("local"));
    let store = construct(&mut vm, "Store", &[]).unwrap();

    assert_eq!(vm.call_method(&store, "get_uri", &[]).unwrap(), vec![Value::from("local")]);
}

#[test]
fn test_store_paths() {
    let mut vm = open_vm(StoreConfig::default());
    let store = construct(&mut vm, "Store", &[]).unwrap();

    let added = vm.call_method(&store, "add_path", &["/store/abc-hello".into()]).unwrap();
    assert_eq!(added, vec![Value::Bool(true)]);
    let again = vm.call_method(&store, "add_path", &["/store/abc-hello".into()]).unwrap();
    assert_eq!(again, vec![Value::Bool(false)]);

    let has = vm.call_method(&store, "has_path", &["/store/abc-hello".into()]).unwrap();
    assert_eq!(has, vec![Value::Bool(true)]);
    assert_eq!(vm.call_method(&store, "paths", &[]).unwrap(), vec![Value::Int(1)]);

    let err = vm.call_method(&store, "add_path", &["relative".into()]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #1 (absolute path expected, got 'relative')");
    let err = vm.call_method(&store, "has_path", &[]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #1 (string expected, got no value)");
}

#[test]
fn test_binary_cache_inherits_and_overrides() {
    let mut vm = open_vm(StoreConfig::default());
    let cache = construct(&mut vm, "BinaryCache", &["cache.example.org".into()]).unwrap();

    assert_eq!(
        vm.call_method(&cache, "get_uri", &[]).unwrap(),
        vec![Value::from("https://cache.example.org")]
    );
    assert_eq!(vm.call_method(&cache, "get_priority", &[]).unwrap(), vec![Value::Int(50)]);
    assert_eq!(vm.call_method(&cache, "get_type", &[]).unwrap(), vec![Value::from("BinaryCache")]);

    // Inherited from Store, operating on the embedded store
    vm.call_method(&cache, "add_path", &["/store/xyz-pkg".into()]).unwrap();
    assert_eq!(vm.call_method(&cache, "paths", &[]).unwrap(), vec![Value::Int(1)]);

    assert_eq!(
        vm.tostring(&cache).unwrap(),
        "<BinaryCache https://cache.example.org priority=50>"
    );
}

#[test]
fn test_cache_priority_argument() {
    let mut vm = open_vm(StoreConfig::default().with_cache_priority(10));
    let default = construct(&mut vm, "BinaryCache", &["a".into()]).unwrap();
    let explicit = construct(&mut vm, "BinaryCache", &["b".into(), Value::Int(30)]).unwrap();

    assert_eq!(vm.call_method(&default, "get_priority", &[]).unwrap(), vec![Value::Int(10)]);
    assert_eq!(vm.call_method(&explicit, "get_priority", &[]).unwrap(), vec![Value::Int(30)]);

    let err = construct(&mut vm, "BinaryCache", &[]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #0 (string expected, got no value)");
    let err = construct(&mut vm, "BinaryCache", &["".into()]).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #0 (cache location must not be empty)");
}

#[test]
fn test_receiver_checks_between_classes() {
    let mut vm = open_vm(StoreConfig::default());
    let store = construct(&mut vm, "Store", &[]).unwrap();
    let cache = construct(&mut vm, "BinaryCache", &["c".into()]).unwrap();

    // A Store method accepts a BinaryCache receiver
    let has_path = vm.index(&store, &Value::from("has_path")).unwrap();
    let result = vm.call(&has_path, &[cache.clone(), "/x".into()]).unwrap();
    assert_eq!(result, vec![Value::Bool(false)]);

    // A BinaryCache method rejects a plain Store
    let get_priority = vm.index(&cache, &Value::from("get_priority")).unwrap();
    let err = vm.call(&get_priority, &[store.clone()]).unwrap_err();
    assert_eq!(err.to_string(), "object of type 'Store' is not a subtype of 'BinaryCache'");

    let err = vm.call_method(&store, "get_priority", &[]).unwrap_err();
    assert_eq!(err.to_string(), "Store has no attribute 'get_priority'");
}

#[test]
fn test_init_is_idempotent() {
    ferrule_store::init();
    assert!(!ferrule_store::init());
}
