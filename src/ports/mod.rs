pub mod database;
pub mod member;
pub mod privilege;
