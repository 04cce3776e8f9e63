pub mod buildbucket;
pub mod inventory;
