pub mod auth;
pub mod receiver;
pub mod spool;
