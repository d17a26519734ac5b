//! End-to-end scenarios through the full request path
//!
//! Everything here goes in through `DeviceNode::handle_request` the way a
//! transport would, and asserts on the response messages and the fixture's
//! backing stores.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use trellis_core::{MessageCode, ServiceKind, Variant};
use trellis_dispatch::Message;

use crate::fixture::{grow_random_tree, TestDevice};

fn value_of(response: &Message) -> Option<&Variant> {
    response.data.as_ref().and_then(|body| body.get("value"))
}

#[test]
fn test_read_through_canonical_path() {
    let device = TestDevice::new().unwrap();
    let response = device.call("/dev/sensors/temp/getdata");
    assert_eq!(response.code, MessageCode::Success);
    assert_eq!(value_of(&response), Some(&Variant::I64(42)));
}

#[test]
fn test_read_through_alias_link() {
    let device = TestDevice::new().unwrap();
    let via_alias = device.call("/dev/temperature/getdata");
    let via_canonical = device.call("/dev/sensors/temp/getdata");
    assert_eq!(via_alias.code, MessageCode::Success);
    assert_eq!(via_alias.data, via_canonical.data);
}

#[test]
fn test_read_without_device_prefix() {
    // Requests fall back to the literal path when the prefix is absent.
    let device = TestDevice::new().unwrap();
    let response = device.call("/sensors/temp/getdata");
    assert_eq!(response.code, MessageCode::Success);
    assert_eq!(value_of(&response), Some(&Variant::I64(42)));
}

#[test]
fn test_unknown_address_is_not_found() {
    let device = TestDevice::new().unwrap();
    let response = device.call("/does/not/exist");
    assert_eq!(response.code, MessageCode::NotFound);
    let body = response.data.unwrap();
    assert!(body.get("message").is_some());
}

#[test]
fn test_write_then_read_roundtrip() {
    let device = TestDevice::new().unwrap();
    let response = device.call_with(
        "/dev/sensors/temp/setdata",
        Variant::map([("value", Variant::I64(7))]),
    );
    assert_eq!(response.code, MessageCode::Success);
    assert_eq!(device.temp.load(Ordering::SeqCst), 7);

    let response = device.call("/dev/sensors/temp/getdata");
    assert_eq!(value_of(&response), Some(&Variant::I64(7)));
}

#[test]
fn test_format_rejects_mismatched_writes() {
    let device = TestDevice::new().unwrap();
    let response = device.call_with(
        "/dev/mode/setdata",
        Variant::map([("value", Variant::I64(5))]),
    );
    assert_eq!(response.code, MessageCode::DataInvalid);
    assert_eq!(*device.mode.lock().unwrap(), "auto");

    let response = device.call_with(
        "/dev/mode/setdata",
        Variant::map([("value", Variant::Str("eco".into()))]),
    );
    assert_eq!(response.code, MessageCode::Success);
    assert_eq!(*device.mode.lock().unwrap(), "eco");
}

#[test]
fn test_cache_window_bounds_delegate_reads() {
    let device = TestDevice::with_cache(Duration::from_millis(100)).unwrap();
    device.call("/dev/sensors/temp/getdata");
    device.call("/dev/sensors/temp/getdata");
    assert_eq!(device.reads.load(Ordering::SeqCst), 1);

    thread::sleep(Duration::from_millis(120));
    let response = device.call("/dev/sensors/temp/getdata");
    assert_eq!(response.code, MessageCode::Success);
    assert_eq!(device.reads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_write_invalidates_cache() {
    let device = TestDevice::with_cache(Duration::from_secs(60)).unwrap();
    let first = device.call("/dev/sensors/temp/getdata");
    assert_eq!(value_of(&first), Some(&Variant::I64(42)));

    device.call_with(
        "/dev/sensors/temp/setdata",
        Variant::map([("value", Variant::I64(7))]),
    );
    let second = device.call("/dev/sensors/temp/getdata");
    assert_eq!(value_of(&second), Some(&Variant::I64(7)));
    assert_eq!(device.reads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_request_handling_survives_panicking_delegate() {
    let device = TestDevice::new().unwrap();
    let tree = device.tree();
    let boom = tree
        .create_service("boom", ServiceKind::Action, |_| panic!("kaboom"))
        .unwrap();
    tree.add_child(tree.root(), boom, false).unwrap();

    let response = device.call("/dev/boom");
    assert_eq!(response.code, MessageCode::InternalError);

    let response = device.call("/dev/sensors/temp/getdata");
    assert_eq!(response.code, MessageCode::Success);
}

#[test]
fn test_subtree_removal_unresolves_addresses() {
    let device = TestDevice::new().unwrap();
    let tree = device.tree();
    let sensors = tree.element_by_address("/sensors").unwrap();

    tree.remove_child(tree.root(), sensors, false).unwrap();
    assert_eq!(
        device.call("/dev/sensors/temp/getdata").code,
        MessageCode::NotFound
    );
    // The alias still points at the detached element, so it dangles too.
    assert_eq!(
        device.call("/dev/temperature/getdata").code,
        MessageCode::NotFound
    );

    tree.add_child(tree.root(), sensors, false).unwrap();
    assert_eq!(
        device.call("/dev/sensors/temp/getdata").code,
        MessageCode::Success
    );
    assert_eq!(
        device.call("/dev/temperature/getdata").code,
        MessageCode::Success
    );
}

#[test]
fn test_wire_subscription_delivery() {
    let device = TestDevice::new().unwrap();
    let response = device.call_with(
        "/dev/sensors/temp/datachanged/subscribe",
        Variant::map([
            ("callback", Variant::Str("/peer/inbox".into())),
            (
                "datatosend",
                Variant::seq([Variant::Str("/sensors/temp".into())]),
            ),
        ]),
    );
    assert_eq!(response.code, MessageCode::Success);

    device.temp.store(50, Ordering::SeqCst);
    let temp_element = device.tree().element_by_address("/sensors/temp").unwrap();
    let queued = device.node.raise_data_changed(temp_element).unwrap();
    assert_eq!(queued, 1);

    let delivery = device.node.pop_delivery().unwrap();
    assert_eq!(delivery.subscription.callback, "/peer/inbox");
    assert_eq!(delivery.notification.source, "/sensors/temp");
    assert_eq!(delivery.notification.event, "datachanged");
    assert_eq!(
        delivery.notification.values,
        vec![("/sensors/temp".to_string(), Variant::I64(50))]
    );
}

#[test]
fn test_unsubscribe_stops_deliveries() {
    let device = TestDevice::new().unwrap();
    let subscribe = Variant::map([("callback", Variant::Str("/peer/inbox".into()))]);
    device.call_with("/dev/sensors/temp/datachanged/subscribe", subscribe);

    let temp_element = device.tree().element_by_address("/sensors/temp").unwrap();
    assert_eq!(device.node.raise_data_changed(temp_element).unwrap(), 1);
    device.node.pop_delivery().unwrap();

    let response = device.call_with(
        "/dev/sensors/temp/datachanged/unsubscribe",
        Variant::map([("callback", Variant::Str("/peer/inbox".into()))]),
    );
    assert_eq!(response.code, MessageCode::Success);
    assert_eq!(device.node.raise_data_changed(temp_element).unwrap(), 0);
}

#[test]
fn test_treechanged_reaches_wire_subscribers() {
    let device = TestDevice::new().unwrap();
    let response = device.call_with(
        "/dev/treechanged/subscribe",
        Variant::map([("callback", Variant::Str("/peer/inbox".into()))]),
    );
    assert_eq!(response.code, MessageCode::Success);

    let tree = device.tree();
    let extra = tree.create_structure("extra").unwrap();
    tree.add_child(tree.root(), extra, true).unwrap();

    let delivery = device.node.pop_delivery().unwrap();
    assert_eq!(delivery.notification.event, "treechanged");
}

#[test]
fn test_getdatamulti_reports_per_address() {
    let device = TestDevice::new().unwrap();
    let response = device.call_with(
        "/dev/getdatamulti",
        Variant::map([(
            "addresses",
            Variant::seq([
                Variant::Str("/sensors/temp".into()),
                Variant::Str("/missing".into()),
            ]),
        )]),
    );
    assert_eq!(response.code, MessageCode::Success);
    let body = response.data.unwrap();
    let good = body.get("/sensors/temp").unwrap();
    assert_eq!(good.get("value"), Some(&Variant::I64(42)));
    let bad = body.get("/missing").unwrap();
    assert!(bad.get("error").is_some());
}

#[test]
fn test_querytree_lists_data_and_services() {
    let device = TestDevice::new().unwrap();
    let response = device.call_with(
        "/dev/querytree",
        Variant::map([("address", Variant::Str("/sensors".into()))]),
    );
    assert_eq!(response.code, MessageCode::Success);
    let body = response.data.unwrap();
    let addresses: Vec<&str> = body
        .as_seq()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(addresses.contains(&"/sensors"));
    assert!(addresses.contains(&"/sensors/temp"));
    assert!(addresses.contains(&"/sensors/temp/getdata"));
}

#[test]
fn test_event_message_writes_without_response() {
    let device = TestDevice::new().unwrap();
    let event = Message::event(9, "/dev/sensors/temp/setdata")
        .with_data(Variant::map([("value", Variant::I64(33))]));
    device.node.handle_event(&event).unwrap();
    assert_eq!(device.temp.load(Ordering::SeqCst), 33);
}

#[test]
fn test_concurrent_reads_during_structural_churn() {
    let device = TestDevice::new().unwrap();
    grow_random_tree(device.tree(), 11, 40).unwrap();

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..25 {
                    let response = device.call("/dev/sensors/temp/getdata");
                    assert_eq!(response.code, MessageCode::Success);
                }
            });
        }
        scope.spawn(|| {
            for i in 0..25 {
                let response = device.call_with(
                    "/dev/sensors/temp/setdata",
                    Variant::map([("value", Variant::I64(i))]),
                );
                assert_eq!(response.code, MessageCode::Success);
            }
        });
        scope.spawn(|| {
            let tree = device.tree();
            for i in 0..10 {
                let scratch = tree
                    .create_structure(&format!("scratch{}", i))
                    .unwrap();
                tree.add_child(tree.root(), scratch, false).unwrap();
                tree.remove_child(tree.root(), scratch, false).unwrap();
                tree.discard(scratch).unwrap();
            }
        });
    });

    let stats = device.node.stats();
    assert_eq!(stats.requests, 125);
    assert_eq!(stats.errors, 0);
}
