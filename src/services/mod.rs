pub mod address_service;
pub mod admin_service;
pub mod auth_service;
pub mod cart_service;
pub mod consultation_service;
pub mod diagnose_service;
pub mod order_service;
pub mod password_reset;
pub mod product_service;
pub mod review_service;
pub mod stats_service;
pub mod uploads;
