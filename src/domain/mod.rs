//! Domain Layer
//!
//! Entities, value objects, ports and the endpoint set. Nothing in here
//! performs I/O.

pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;
