pub mod catalog;
pub mod orders;
pub mod payments;
pub mod stats;
pub mod temp_orders;
pub mod users;
