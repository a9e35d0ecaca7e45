pub mod auth;
pub mod devices;
pub mod folders;
pub mod health;
pub mod tags;
pub mod tenants;
pub mod users;
