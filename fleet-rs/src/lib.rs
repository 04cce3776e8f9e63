//! Lab Fleet Base Crate
//!
//! This crate contains shared type definitions, service clients and helper
//! functions used by the `fleet` and `satlab` command line tools. Wire types
//! for the inventory and build services live under [`api`]; everything else
//! is glue that both tools need to talk to those services the same way.

pub mod api;
pub mod auth;
pub mod config;
pub mod deploy;
pub mod dut;
pub mod inventory;
pub mod prpc;
pub mod util;
