pub mod calendar;
pub mod plan;
pub mod profile;
pub mod recipe;
pub mod slot;
