pub mod agent;
pub mod errors;
pub mod executor;
pub mod hmm;
pub mod indicators;
pub mod market_data;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod registry;
pub mod systems;
