mod endpoint_set;

pub use endpoint_set::{
    ConfigureSummary, EndpointSet, Reinsertion, Removed, RoutingState, SharedEndpointSet,
};
