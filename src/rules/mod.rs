pub mod engine;
pub mod links;

pub use engine::evaluate;
pub use links::extract_urls;
