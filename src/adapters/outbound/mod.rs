mod dashmap_extension_accessor;
mod dashmap_session_store;
mod http_service_connection;

pub use dashmap_extension_accessor::DashMapExtensionAccessor;
pub use dashmap_session_store::DashMapSessionStore;
pub use http_service_connection::{HttpServiceConnection, EXTENSION_HEADER_PREFIX};
