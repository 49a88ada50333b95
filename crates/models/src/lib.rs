pub mod errors;
pub mod db;
pub mod service_key;
