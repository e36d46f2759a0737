pub mod database;
pub mod empire_records;
pub mod error;
pub mod row_helpers;
pub mod schema;

pub use database::Database;
pub use empire_records::EmpireRecordRepo;
pub use error::StoreError;
