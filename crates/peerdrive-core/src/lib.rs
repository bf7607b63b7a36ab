//! PeerDrive Core - Domain model for the reconciliation core
//!
//! This crate contains:
//! - **Domain types** - `RelativePath`, `ContentHash`, `NodeId`, `EntryState`
//! - **Snapshots** - immutable path-keyed records of a namespace at one instant
//! - **Namespace tree** - the remote, authoritative tree of files and folders
//! - **Port definitions** - `INamespaceTree`, the read-only query interface
//!   the synchronizer depends on
//! - **Configuration** - typed YAML configuration with validation
//!
//! # Architecture
//!
//! Like the adapters built on top of it, this crate follows a ports &
//! adapters layout. The domain module is pure: no I/O happens here except
//! for loading the configuration file.

pub mod config;
pub mod domain;
pub mod ports;
