pub mod admin;
pub mod alert;
pub mod analytics;
pub mod customer;
pub mod events;
pub mod expense;
pub mod inventory;
pub mod notification;
pub mod service;
pub mod worker;
