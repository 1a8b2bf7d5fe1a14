pub mod alert;
pub mod customer;
pub mod expense;
pub mod inventory;
pub mod profile;
pub mod role;
pub mod service;
pub mod user;
pub mod worker;
