//! Repository layer: zero-sized structs with async query functions.

pub mod region_repo;
pub mod stat_repo;

pub use region_repo::RegionRepo;
pub use stat_repo::StatRepo;
