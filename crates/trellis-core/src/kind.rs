//! Element and service type tags
//!
//! Every element in the tree carries one of five types:
//! - Device: a structural root exposing the standard management services
//! - Structure: a plain grouping node
//! - Data: a readable and/or writable value with optional caching
//! - Service: an invokable delegate
//! - Event: a subscribable notification source

use std::fmt;

/// Element type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ElementType {
    Device,
    #[default]
    Structure,
    Data,
    Service,
    Event,
}

impl ElementType {
    /// Lowercase name as used in tree dumps and query payloads
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Device => "device",
            ElementType::Structure => "structure",
            ElementType::Data => "data",
            ElementType::Service => "service",
            ElementType::Event => "event",
        }
    }

    /// Parse from a lowercase name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "device" => Some(ElementType::Device),
            "structure" => Some(ElementType::Structure),
            "data" => Some(ElementType::Data),
            "service" => Some(ElementType::Service),
            "event" => Some(ElementType::Event),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a service element's delegate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ServiceKind {
    /// Fire an action; the payload is whatever the action needs
    #[default]
    Action,
    /// Read a value
    Getter,
    /// Write a value
    Setter,
    /// Combined read/write/invoke surface
    Full,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Action => "action",
            ServiceKind::Getter => "getter",
            ServiceKind::Setter => "setter",
            ServiceKind::Full => "full",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
