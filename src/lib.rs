pub mod agent;
pub mod conversation;
pub mod errors;
pub mod providers;
pub mod reasoning;
pub mod tools;
