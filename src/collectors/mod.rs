pub mod refresh;
pub mod tle_fetcher;
