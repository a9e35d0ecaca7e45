pub mod access;
pub mod devices;
pub mod entities;
pub mod error;
pub mod folders;
pub mod roles;
pub mod sessions;
pub mod tags;
pub mod tenants;
pub mod users;
