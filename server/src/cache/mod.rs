pub mod canonical;
pub mod providers;
pub mod util;
