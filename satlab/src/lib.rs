//! Site-local tooling for satlab appliances.
//!
//! A satlab appliance hosts DUTs on premises. Every resource it registers in
//! the fleet inventory carries the appliance's site prefix, and every DUT it
//! adds gets a record in the DNS container running next to it.

pub mod add_dut;
pub mod config;
pub mod dns;
pub mod error;
pub mod inventory;
pub mod name;
pub mod process;
pub mod site;
pub mod summary;

pub use error::Error;
