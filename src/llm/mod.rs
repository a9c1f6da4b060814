pub mod models;
pub mod prompts;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod tools;
pub mod types;
