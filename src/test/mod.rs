mod db;
mod install;
mod utils;

pub use utils::test_utils;
