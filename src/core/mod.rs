pub mod geodesy;
pub mod orbit;
pub mod time_grid;
pub mod tle;
