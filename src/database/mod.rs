pub mod audit;
pub mod manager;
pub mod memory;
pub mod query_builder;
pub mod row;
pub mod table;

pub use audit::{AuditLog, PgAuditLog, TracingAuditLog};
pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryTable;
pub use row::{MemoryTables, PgTables, TableFactory, TableRow};
pub use table::PgTable;
