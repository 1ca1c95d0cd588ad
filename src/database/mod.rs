pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryItemStore;
pub use models::item::{Item, ItemInput, ItemPatch};
pub use postgres::PgItemStore;
pub use store::{ItemStore, WriteCondition};
