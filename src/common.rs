pub mod datetime;
pub mod db_utils;
pub mod diagnostics;
pub mod error;
