pub mod clock;
pub mod distance;
pub mod geo_fix;
pub mod heading;
pub mod units;
