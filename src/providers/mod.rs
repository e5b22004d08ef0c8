pub mod caching;
pub mod cbr;
pub mod market;
pub mod util;
