pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod consultations;
pub mod diagnose;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod stats;
