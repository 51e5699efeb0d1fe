pub mod analytics;
pub mod db;
pub mod deflection;
pub mod demo;
pub mod domain;
pub mod error;
pub mod estimate;
pub mod normalize;
pub mod repo;
pub mod validate;
