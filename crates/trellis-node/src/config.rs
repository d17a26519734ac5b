//! Node configuration

/// Device node configuration
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Root element identifier, also the wire address prefix
    pub identifier: String,
    /// Stable unique id reported by `getidentity`, if any
    pub uid: Option<String>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
    /// Maximum queued outbound deliveries before the oldest is dropped
    pub outbox_limit: usize,
}

impl NodeConfig {
    pub fn new(identifier: &str) -> Self {
        NodeConfig {
            identifier: identifier.to_string(),
            ..NodeConfig::default()
        }
    }

    pub fn with_uid(mut self, uid: &str) -> Self {
        self.uid = Some(uid.to_string());
        self
    }

    pub fn with_vendor(mut self, vendor: &str) -> Self {
        self.vendor = Some(vendor.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn with_outbox_limit(mut self, limit: usize) -> Self {
        self.outbox_limit = limit;
        self
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            identifier: "device".to_string(),
            uid: None,
            vendor: None,
            model: None,
            version: None,
            outbox_limit: 1024,
        }
    }
}
