pub mod audit;
pub mod device;
pub mod entity;
pub mod folder;
pub mod heartbeat;
pub mod role;
pub mod tag;
pub mod tenant;
pub mod user;

pub use audit::Audit;
pub use device::{Device, DeviceOut};
pub use entity::Entity;
pub use folder::Folder;
pub use heartbeat::Heartbeat;
pub use role::Role;
pub use tag::{Tag, TagType};
pub use tenant::{Tenant, TenantSettings};
pub use user::User;
