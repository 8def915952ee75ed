//! `tb-domain`: types shared by every tagbridge crate.
//!
//! - [`config`]: the TOML configuration tree and its validation.
//! - [`endpoint`]: validated industrial endpoint addresses.
//! - [`node`]: address-space primitives (node ids, node classes, values).
//! - [`tag`]: normalized tag records and batch result entries.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod node;
pub mod tag;

pub use endpoint::EndpointUrl;
pub use error::{Error, Result};
pub use node::{NodeClass, NodeId, Variant};
pub use tag::{BatchEntry, EndpointFailure, Tag, TagSample};
