//! Consumer Extension Accessor Port
//!
//! Protocol extensions the consumer attaches to requests or reads back from
//! responses. The accessor is handed to connections when they are built and
//! cannot be swapped afterwards.

use serde::{Deserialize, Serialize};

/// Message family an extension is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtensionTarget {
    ServiceDescription,
    Markup,
    Registration,
    PortletManagement,
}

/// A single name/value extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub name: String,
    pub value: String,
}

impl Extension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Access to request and response extensions.
pub trait ConsumerExtensionAccessor: Send + Sync {
    /// Extensions to add to outgoing requests of the given family.
    /// Empty when none were registered.
    fn request_extensions_for(&self, target: ExtensionTarget) -> Vec<Extension>;

    fn add_request_extension(&self, target: ExtensionTarget, name: &str, value: &str);

    /// Extensions read back from responses of the given family.
    fn response_extensions_from(&self, target: ExtensionTarget) -> Vec<Extension>;

    fn add_response_extension(&self, target: ExtensionTarget, extension: Extension);
}
