//! Device profile
//!
//! The standard introspection and management services every device element
//! carries as children, plus the `treechanged` event. Service delegates hold
//! a weak handle to the tree; a dropped tree turns invocations into faults
//! instead of keeping the arena alive through its own services.

use std::sync::{Arc, Weak};

use trellis_core::{
    ElementId, ElementType, MessageCode, ServiceError, ServiceKind, ServiceResult, TreeError,
    TreeResult, Variant,
};

use crate::data::DataPoint;
use crate::reference::RefKind;
use crate::tree::Tree;

// ===== STANDARD IDENTIFIERS =====

pub const GET_IDENTITY: &str = "getidentity";
pub const GET_TREE: &str = "gettree";
pub const QUERY_TREE: &str = "querytree";
pub const GET_DATA_MULTI: &str = "getdatamulti";
pub const SET_DATA_MULTI: &str = "setdatamulti";
pub const GET_SUBSCRIBER_LIST: &str = "getsubscriberlist";
pub const SUBSCRIBE: &str = "subscribe";
pub const UNSUBSCRIBE: &str = "unsubscribe";
pub const GET_DATA: &str = "getdata";
pub const SET_DATA: &str = "setdata";
pub const TREE_CHANGED: &str = "treechanged";
pub const DATA_CHANGED: &str = "datachanged";

/// What `getidentity` reports about a device
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub name: String,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        DeviceIdentity {
            name: name.into(),
            vendor: None,
            model: None,
            version: None,
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

fn upgrade(weak: &Weak<Tree>) -> ServiceResult<Arc<Tree>> {
    match weak.upgrade() {
        Some(tree) => Ok(tree),
        None => Err(ServiceError::fault("device tree dropped")),
    }
}

fn tree_err(err: TreeError) -> ServiceError {
    ServiceError::fault(err.to_string())
}

/// Install the standard services and the `treechanged` event as children of
/// `device`. Returns the `treechanged` element for the caller to wire up.
pub fn install_device_profile(
    tree: &Arc<Tree>,
    device: ElementId,
    identity: DeviceIdentity,
) -> TreeResult<ElementId> {
    let weak = Arc::downgrade(tree);
    let ident = identity;
    let getidentity = tree.create_service(GET_IDENTITY, ServiceKind::Getter, move |_req| {
        let tree = upgrade(&weak)?;
        let mut out: Vec<(String, Variant)> = vec![("name".into(), ident.name.clone().into())];
        if let Some(vendor) = &ident.vendor {
            out.push(("vendor".into(), vendor.clone().into()));
        }
        if let Some(model) = &ident.model {
            out.push(("model".into(), model.clone().into()));
        }
        if let Some(version) = &ident.version {
            out.push(("version".into(), version.clone().into()));
        }
        if let Some(addr) = tree.address(device).map_err(tree_err)? {
            out.push(("address".into(), addr.into()));
        }
        if let Some(uid) = tree.uid(device).map_err(tree_err)? {
            out.push(("uid".into(), uid.into()));
        }
        Ok(Variant::map(out))
    })?;
    tree.add_child(device, getidentity, false)?;

    let weak = Arc::downgrade(tree);
    let gettree = tree.create_service(GET_TREE, ServiceKind::Getter, move |_req| {
        let tree = upgrade(&weak)?;
        dump_element(&tree, device).map_err(tree_err)
    })?;
    tree.add_child(device, gettree, false)?;

    let weak = Arc::downgrade(tree);
    let querytree = tree.create_service(QUERY_TREE, ServiceKind::Getter, move |req| {
        let tree = upgrade(&weak)?;
        let payload = req.payload.unwrap_or(Variant::Null);
        let start = match payload.get("address").and_then(|v| v.as_str()) {
            Some(addr) => match tree.element_by_address(addr) {
                Some(id) => id,
                None => {
                    return Err(ServiceError::failure(
                        MessageCode::NotFound,
                        "no element at address",
                    ))
                }
            },
            None => device,
        };
        let profile = payload
            .get("profile")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let matches = tree
            .elements_where(start, true, true, |node| {
                !node.is_hidden()
                    && node.address().is_some()
                    && profile.as_deref().map_or(true, |p| node.has_profile(p))
            })
            .map_err(tree_err)?;
        let mut addresses = Vec::new();
        for id in matches {
            if let Some(addr) = tree.address(id).map_err(tree_err)? {
                addresses.push(Variant::Str(addr));
            }
        }
        Ok(Variant::Seq(addresses))
    })?;
    tree.add_child(device, querytree, false)?;

    let weak = Arc::downgrade(tree);
    let getdatamulti = tree.create_service(GET_DATA_MULTI, ServiceKind::Getter, move |req| {
        let payload = req.payload.unwrap_or(Variant::Null);
        let addresses = match payload.get("addresses").and_then(|v| v.as_seq()) {
            Some(seq) => seq.to_vec(),
            None => {
                return Err(ServiceError::failure(
                    MessageCode::BadRequest,
                    "getdatamulti requires an addresses list",
                ))
            }
        };
        let tree = upgrade(&weak)?;
        let mut entries = Vec::new();
        for item in addresses {
            let addr = match item.as_str() {
                Some(a) => a.to_string(),
                None => continue,
            };
            let outcome = match data_point_at(&tree, &addr)
                .and_then(|point| point.read().map_err(|e| e.to_string()))
            {
                Ok(value) => Variant::map([("value", value)]),
                Err(message) => Variant::map([("error", Variant::Str(message))]),
            };
            entries.push((Variant::Str(addr), outcome));
        }
        Ok(Variant::Map(entries))
    })?;
    tree.add_child(device, getdatamulti, false)?;

    let weak = Arc::downgrade(tree);
    let setdatamulti = tree.create_service(SET_DATA_MULTI, ServiceKind::Setter, move |req| {
        let payload = req.payload.unwrap_or(Variant::Null);
        let writes = match payload.as_map() {
            Some(entries) => entries.to_vec(),
            None => {
                return Err(ServiceError::failure(
                    MessageCode::BadRequest,
                    "setdatamulti requires a map of address to value",
                ))
            }
        };
        let tree = upgrade(&weak)?;
        let mut entries = Vec::new();
        for (key, value) in writes {
            let addr = match key.as_str() {
                Some(a) => a.to_string(),
                None => continue,
            };
            let outcome = match data_point_at(&tree, &addr)
                .and_then(|point| point.write(value).map_err(|e| e.to_string()))
            {
                Ok(()) => Variant::Str("ok".into()),
                Err(message) => Variant::map([("error", Variant::Str(message))]),
            };
            entries.push((Variant::Str(addr), outcome));
        }
        Ok(Variant::Map(entries))
    })?;
    tree.add_child(device, setdatamulti, false)?;

    let weak = Arc::downgrade(tree);
    let getsubscriberlist =
        tree.create_service(GET_SUBSCRIBER_LIST, ServiceKind::Getter, move |_req| {
            let tree = upgrade(&weak)?;
            let events = tree
                .elements_by_type(device, ElementType::Event, false, true)
                .map_err(tree_err)?;
            let mut entries = Vec::new();
            for event in events {
                let addr = match tree.address(event).map_err(tree_err)? {
                    Some(a) => a,
                    None => continue,
                };
                let point = tree.event(event).map_err(tree_err)?;
                let subscribers: Vec<Variant> = point
                    .subscriptions()
                    .iter()
                    .map(|s| {
                        Variant::map([
                            ("id", Variant::Str(s.id.clone())),
                            ("callback", Variant::Str(s.callback.clone())),
                        ])
                    })
                    .collect();
                entries.push((Variant::Str(addr), Variant::Seq(subscribers)));
            }
            Ok(Variant::Map(entries))
        })?;
    tree.add_child(device, getsubscriberlist, false)?;

    let treechanged = tree.create_event(TREE_CHANGED)?;
    tree.add_child(device, treechanged, false)?;
    Ok(treechanged)
}

/// Recursive tree dump used by `gettree`. Hidden elements are skipped;
/// links appear as leaf entries naming their target's canonical address.
fn dump_element(tree: &Tree, id: ElementId) -> TreeResult<Variant> {
    let mut out: Vec<(String, Variant)> = vec![
        ("identifier".into(), tree.identifier(id)?.into()),
        ("type".into(), tree.element_type(id)?.as_str().into()),
    ];
    if let Some(addr) = tree.address(id)? {
        out.push(("address".into(), addr.into()));
    }
    let profiles = tree.profiles(id)?;
    if !profiles.is_empty() {
        out.push((
            "profiles".into(),
            Variant::seq(profiles.into_iter().map(Variant::Str)),
        ));
    }
    let mut elements = Vec::new();
    for r in tree.forward_references(id)? {
        if tree.is_hidden(r.target)? {
            continue;
        }
        match r.kind {
            RefKind::Child => elements.push(dump_element(tree, r.target)?),
            RefKind::Link => {
                let mut entry: Vec<(String, Variant)> = vec![
                    ("identifier".into(), r.identifier.clone().into()),
                    ("type".into(), "link".into()),
                ];
                if let Some(target) = tree.address(r.target)? {
                    entry.push(("target".into(), target.into()));
                }
                elements.push(Variant::map(entry));
            }
        }
    }
    if !elements.is_empty() {
        out.push(("elements".into(), Variant::Seq(elements)));
    }
    Ok(Variant::map(out))
}

fn data_point_at(tree: &Tree, addr: &str) -> Result<DataPoint, String> {
    let id = match tree.element_by_address(addr) {
        Some(id) => id,
        None => return Err(format!("no element at {}", addr)),
    };
    tree.data(id).map_err(|e| e.to_string())
}
