//! Basic Trellis Device Example
//!
//! This example builds a small thermostat device, serves requests through
//! the dispatcher the way a transport would, and drains the event outbox.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use trellis_core::{Format, MessageCode, ServiceError, Variant, VariantKind};
use trellis_dispatch::Message;
use trellis_node::{init_tracing, DeviceNode, NodeConfig};
use trellis_tree::DataSpec;

fn main() {
    init_tracing();
    println!("=== Trellis Basic Device Example ===\n");

    // 1. Build the device node
    println!("1. Building device node...");
    let node = DeviceNode::new(
        NodeConfig::new("thermostat")
            .with_uid("tstat-0001")
            .with_vendor("trellis")
            .with_model("demo-1")
            .with_version("0.2.0"),
    )
    .expect("node construction failed");
    let tree = node.tree().clone();
    println!("   Root identifier: {}", node.config().identifier);

    // 2. Attach a temperature sensor and a setpoint
    println!("\n2. Attaching data elements...");
    let temperature = Arc::new(AtomicI64::new(215));
    let reading = temperature.clone();
    let sensor = tree
        .create_data(
            "temperature",
            DataSpec::new()
                .with_read(move || Ok(Variant::F64(reading.load(Ordering::SeqCst) as f64 / 10.0)))
                .with_format(Format::new(VariantKind::F64).with_unit("celsius")),
        )
        .expect("sensor creation failed");

    let setpoint = Arc::new(AtomicI64::new(210));
    let read_setpoint = setpoint.clone();
    let write_setpoint = setpoint.clone();
    let target = tree
        .create_data(
            "setpoint",
            DataSpec::new()
                .with_read(move || {
                    Ok(Variant::F64(read_setpoint.load(Ordering::SeqCst) as f64 / 10.0))
                })
                .with_write(move |value| match value.as_f64() {
                    Some(v) => {
                        write_setpoint.store((v * 10.0) as i64, Ordering::SeqCst);
                        Ok(())
                    }
                    None => Err(ServiceError::failure(
                        MessageCode::DataInvalid,
                        "expected a number",
                    )),
                })
                .with_format(
                    Format::new(VariantKind::F64)
                        .with_unit("celsius")
                        .with_range(5.0, 35.0),
                ),
        )
        .expect("setpoint creation failed");

    let climate = tree
        .create_structure("climate")
        .expect("structure creation failed");
    tree.add_child(tree.root(), climate, false)
        .expect("attach failed");
    tree.add_child(climate, sensor, false).expect("attach failed");
    tree.add_child(climate, target, false).expect("attach failed");
    // A short alias next to the root.
    tree.add_link(tree.root(), sensor, Some("temp"), false)
        .expect("link failed");
    println!("   /climate/temperature, /climate/setpoint, /temp -> sensor");

    // 3. Ask the device who it is
    println!("\n3. getidentity...");
    let response = node.handle_request(&Message::request(1, "/thermostat/getidentity"));
    println!("   {:?} {:?}", response.code, response.data);

    // 4. Read the sensor, canonical path and alias
    println!("\n4. Reading temperature...");
    let response = node.handle_request(&Message::request(2, "/thermostat/climate/temperature/getdata"));
    println!("   canonical: {:?}", response.data);
    let response = node.handle_request(&Message::request(3, "/thermostat/temp/getdata"));
    println!("   via alias: {:?}", response.data);

    // 5. Move the setpoint over the wire
    println!("\n5. Writing setpoint...");
    let request = Message::request(4, "/thermostat/climate/setpoint/setdata")
        .with_data(Variant::map([("value", Variant::F64(22.5))]));
    let response = node.handle_request(&request);
    println!("   write: {:?}", response.code);
    println!("   store now: {}", setpoint.load(Ordering::SeqCst) as f64 / 10.0);

    // 6. Subscribe to changes and raise one
    println!("\n6. Subscribing to datachanged...");
    let subscribe = Message::request(5, "/thermostat/climate/temperature/datachanged/subscribe")
        .with_data(Variant::map([
            ("callback", Variant::Str("/controller/inbox".into())),
            (
                "datatosend",
                Variant::seq([Variant::Str("/climate/temperature".into())]),
            ),
        ]));
    let response = node.handle_request(&subscribe);
    println!("   subscribe: {:?}", response.code);

    temperature.store(230, Ordering::SeqCst);
    let queued = node.raise_data_changed(sensor).expect("raise failed");
    println!("   raised datachanged, queued {} delivery(s)", queued);
    while let Some(delivery) = node.pop_delivery() {
        println!(
            "   -> {} from {}: {:?}",
            delivery.notification.event, delivery.notification.source, delivery.notification.values
        );
    }

    // 7. Dump the tree as a client would see it
    println!("\n7. querytree...");
    let response = node.handle_request(&Message::request(6, "/thermostat/querytree"));
    if let Some(Variant::Seq(addresses)) = response.data {
        for addr in addresses {
            println!("   {}", addr);
        }
    }

    println!("\n=== Example Complete ===");
}
