//! ctup - compatibility tool provisioning for Linux game launchers
//!
//! Library crate with the provisioning pipeline, shared between the CLI and
//! graphical frontends.

pub mod archive;
pub mod checksum;
pub mod config;
pub mod ctmods;
pub mod download;
pub mod error;
pub mod installed;
pub mod launcher;
pub mod logging;
pub mod normalize;
pub mod paths;
pub mod registry;
pub mod resolver;
pub mod worker;

pub use error::{ErrorKind, ProvisionError, Result};
