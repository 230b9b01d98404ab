pub mod blocks;
pub mod geometry;
pub mod language;
pub mod preprocess;
pub mod store;
