pub mod book;
pub mod order;
pub mod order_item;
pub mod temp_order;
pub mod user;
