pub mod health;
pub mod receive;
