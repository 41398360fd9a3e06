pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::InMemoryTable;
pub use postgres::PgTable;
pub use repository::{ManagerRegistry, RoomStore, TelemetryStore, TenantDirectory, UserDirectory};
pub use store::{Item, ItemKey, SortOrder, StoreError, StoreResult, Table};
