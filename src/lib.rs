pub mod api;
pub mod auth;
pub mod completion;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod model;
pub mod models;
pub mod permissions;
pub mod realtime;
pub mod registry;
pub mod repository;
pub mod routes;
pub mod utils;
