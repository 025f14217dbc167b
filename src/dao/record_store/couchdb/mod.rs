mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchRecordStore;
