pub mod model;
pub mod query;
pub mod response;
pub mod test_utils;
