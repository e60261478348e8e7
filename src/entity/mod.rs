pub mod audit_logs;
pub mod cart_items;
pub mod consultations;
pub mod import_logs;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod user_addresses;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use consultations::Entity as Consultations;
pub use import_logs::Entity as ImportLogs;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use user_addresses::Entity as UserAddresses;
pub use users::Entity as Users;
