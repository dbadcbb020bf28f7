//! DashMap Extension Accessor
//!
//! Implements ConsumerExtensionAccessor with one DashMap for request
//! extensions and one for extensions read back from responses.

use crate::domain::ports::{ConsumerExtensionAccessor, Extension, ExtensionTarget};
use dashmap::DashMap;

/// In-memory extension registry shared by every connection of a manager.
#[derive(Default)]
pub struct DashMapExtensionAccessor {
    requests: DashMap<ExtensionTarget, Vec<Extension>>,
    responses: DashMap<ExtensionTarget, Vec<Extension>>,
}

impl DashMapExtensionAccessor {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Replace the extension named like `extension`, or append it.
fn upsert(extensions: &mut Vec<Extension>, extension: Extension) {
    if let Some(existing) = extensions.iter_mut().find(|e| e.name == extension.name) {
        existing.value = extension.value;
        return;
    }
    extensions.push(extension);
}

impl ConsumerExtensionAccessor for DashMapExtensionAccessor {
    fn request_extensions_for(&self, target: ExtensionTarget) -> Vec<Extension> {
        self.requests
            .get(&target)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Adding a name twice for the same target replaces its value.
    fn add_request_extension(&self, target: ExtensionTarget, name: &str, value: &str) {
        upsert(
            &mut self.requests.entry(target).or_default(),
            Extension::new(name, value),
        );
    }

    fn response_extensions_from(&self, target: ExtensionTarget) -> Vec<Extension> {
        self.responses
            .get(&target)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// The latest response wins for a given name.
    fn add_response_extension(&self, target: ExtensionTarget, extension: Extension) {
        upsert(&mut self.responses.entry(target).or_default(), extension);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_empty_by_default() {
        let accessor = DashMapExtensionAccessor::new();
        assert!(accessor
            .request_extensions_for(ExtensionTarget::Markup)
            .is_empty());
        assert!(accessor
            .response_extensions_from(ExtensionTarget::Markup)
            .is_empty());
    }

    #[test]
    fn test_request_extensions_are_per_target() {
        let accessor = DashMapExtensionAccessor::new();
        accessor.add_request_extension(ExtensionTarget::ServiceDescription, "locale", "en");

        assert_eq!(
            accessor.request_extensions_for(ExtensionTarget::ServiceDescription),
            vec![Extension::new("locale", "en")]
        );
        assert!(accessor
            .request_extensions_for(ExtensionTarget::Registration)
            .is_empty());
    }

    #[test]
    fn test_request_extension_replaces_same_name() {
        let accessor = DashMapExtensionAccessor::new();
        accessor.add_request_extension(ExtensionTarget::Markup, "locale", "en");
        accessor.add_request_extension(ExtensionTarget::Markup, "theme", "dark");
        accessor.add_request_extension(ExtensionTarget::Markup, "locale", "de");

        assert_eq!(
            accessor.request_extensions_for(ExtensionTarget::Markup),
            vec![Extension::new("locale", "de"), Extension::new("theme", "dark")]
        );
    }

    #[test]
    fn test_response_extension_replaces_same_name() {
        let accessor = DashMapExtensionAccessor::new();
        for version in ["producer/1.0", "producer/1.1", "producer/1.2"] {
            accessor.add_response_extension(
                ExtensionTarget::ServiceDescription,
                Extension::new("Server", version),
            );
        }
        accessor.add_response_extension(
            ExtensionTarget::ServiceDescription,
            Extension::new("Via", "gateway"),
        );

        assert_eq!(
            accessor.response_extensions_from(ExtensionTarget::ServiceDescription),
            vec![
                Extension::new("Server", "producer/1.2"),
                Extension::new("Via", "gateway")
            ]
        );
    }
}
