pub mod calendar;
pub mod events;
pub mod fetch;
pub mod model;
mod model_impls;
pub mod nearest;
pub mod profile;
pub mod read;
pub mod resource;
pub mod stats;
pub mod sync;
