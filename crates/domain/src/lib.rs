pub mod errors;
pub mod order;
pub mod record;

pub use errors::DomainError;
pub use order::{Delivery, Item, Order, Payment};
pub use record::{OrderRecord, OrderUid};
