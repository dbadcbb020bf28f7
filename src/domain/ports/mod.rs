mod extension_accessor;
mod remote_connection;
mod session_affinity_store;

pub use extension_accessor::{ConsumerExtensionAccessor, Extension, ExtensionTarget};
pub use remote_connection::{same_connection, RemoteConnection};
pub use session_affinity_store::SessionAffinityStore;
