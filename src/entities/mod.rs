//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod category;
pub mod order;
pub mod order_product;
pub mod product;
pub mod product_promotion_event;
pub mod promotion_event;
pub mod stock_management;
pub mod user;

// Re-export specific types to avoid conflicts
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use order_product::{
    Column as OrderProductColumn, Entity as OrderProduct, Model as OrderProductModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use product_promotion_event::{
    Column as ProductPromotionEventColumn, Entity as ProductPromotionEvent,
    Model as ProductPromotionEventModel,
};
pub use promotion_event::{
    Column as PromotionEventColumn, Entity as PromotionEvent, Model as PromotionEventModel,
};
pub use stock_management::{
    Column as StockManagementColumn, Entity as StockManagement, Model as StockManagementModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
