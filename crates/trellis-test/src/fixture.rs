//! Canned devices and tree growth helpers

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trellis_core::{
    ElementId, Format, MessageCode, ServiceError, TreeResult, Variant, VariantKind,
};
use trellis_dispatch::Message;
use trellis_node::{DeviceNode, NodeConfig};
use trellis_tree::{DataSpec, Tree};

/// A small device every scenario starts from.
///
/// Shape:
///
/// ```text
/// dev (device, root)
/// ├── sensors (structure)
/// │   └── temp (data, readable and writable, backed by `temp`)
/// ├── mode (data, string, backed by `mode`)
/// └── temperature -> /sensors/temp (link)
/// ```
///
/// Every read of `temp` bumps `reads`, which is how the scenarios observe
/// whether the cache absorbed a request.
pub struct TestDevice {
    pub node: DeviceNode,
    /// Backing value of `/sensors/temp`
    pub temp: Arc<AtomicI64>,
    /// Delegate read count for `/sensors/temp`
    pub reads: Arc<AtomicU64>,
    /// Backing value of `/mode`
    pub mode: Arc<Mutex<String>>,
    cid: AtomicU64,
}

impl TestDevice {
    /// Build the device with uncached data elements.
    pub fn new() -> TreeResult<TestDevice> {
        TestDevice::build(None)
    }

    /// Build the device with the temperature element caching reads.
    pub fn with_cache(timeout: Duration) -> TreeResult<TestDevice> {
        TestDevice::build(Some(timeout))
    }

    fn build(cache: Option<Duration>) -> TreeResult<TestDevice> {
        let node = DeviceNode::new(NodeConfig::new("dev").with_vendor("trellis"))?;
        let tree = node.tree().clone();

        let temp = Arc::new(AtomicI64::new(42));
        let reads = Arc::new(AtomicU64::new(0));
        let read_temp = temp.clone();
        let read_count = reads.clone();
        let write_temp = temp.clone();
        let mut spec = DataSpec::new()
            .with_read(move || {
                read_count.fetch_add(1, Ordering::SeqCst);
                Ok(Variant::I64(read_temp.load(Ordering::SeqCst)))
            })
            .with_write(move |value| match value.as_i64() {
                Some(v) => {
                    write_temp.store(v, Ordering::SeqCst);
                    Ok(())
                }
                None => Err(ServiceError::failure(
                    MessageCode::DataInvalid,
                    "expected an integer",
                )),
            })
            .with_format(Format::new(VariantKind::I64));
        if let Some(timeout) = cache {
            spec = spec.with_cache_timeout(timeout);
        }

        let sensors = tree.create_structure("sensors")?;
        let temp_element = tree.create_data("temp", spec)?;
        tree.add_child(tree.root(), sensors, false)?;
        tree.add_child(sensors, temp_element, false)?;
        tree.add_link(tree.root(), temp_element, Some("temperature"), false)?;

        let mode = Arc::new(Mutex::new("auto".to_string()));
        let read_mode = mode.clone();
        let write_mode = mode.clone();
        let mode_element = tree.create_data(
            "mode",
            DataSpec::new()
                .with_read(move || match read_mode.lock() {
                    Ok(guard) => Ok(Variant::Str(guard.clone())),
                    Err(_) => Err(ServiceError::fault("mode store poisoned")),
                })
                .with_write(move |value| match value.as_str() {
                    Some(v) => match write_mode.lock() {
                        Ok(mut guard) => {
                            *guard = v.to_string();
                            Ok(())
                        }
                        Err(_) => Err(ServiceError::fault("mode store poisoned")),
                    },
                    None => Err(ServiceError::failure(
                        MessageCode::DataInvalid,
                        "expected a string",
                    )),
                })
                .with_format(Format::new(VariantKind::Str)),
        )?;
        tree.add_child(tree.root(), mode_element, false)?;

        Ok(TestDevice {
            node,
            temp,
            reads,
            mode,
            cid: AtomicU64::new(1),
        })
    }

    pub fn tree(&self) -> &Arc<Tree> {
        self.node.tree()
    }

    pub fn next_cid(&self) -> u64 {
        self.cid.fetch_add(1, Ordering::Relaxed)
    }

    /// Build a request with an automatic correlation id.
    pub fn request(&self, adr: &str) -> Message {
        Message::request(self.next_cid(), adr)
    }

    /// Run a request through the node and hand back the response.
    pub fn call(&self, adr: &str) -> Message {
        self.node.handle_request(&self.request(adr))
    }

    /// Like [`call`](Self::call) but with a payload.
    pub fn call_with(&self, adr: &str, payload: Variant) -> Message {
        self.node.handle_request(&self.request(adr).with_data(payload))
    }
}

/// Attach `count` structure elements at random spots below the root.
///
/// Deterministic for a given seed. Returns the created elements in
/// creation order; each new element may become a parent of later ones,
/// so the result is a tree of uneven depth, not a star.
pub fn grow_random_tree(tree: &Tree, seed: u64, count: usize) -> TreeResult<Vec<ElementId>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut parents = vec![tree.root()];
    let mut created = Vec::with_capacity(count);
    for i in 0..count {
        let element = tree.create_structure(&format!("n{}", i))?;
        let parent = parents[rng.gen_range(0..parents.len())];
        tree.add_child(parent, element, false)?;
        parents.push(element);
        created.push(element);
    }
    Ok(created)
}
