pub mod fsck;
pub mod fsck_backend;
pub mod fsck_types;
pub mod mock;
pub mod repair;
