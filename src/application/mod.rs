pub mod error;
pub mod history;
pub mod listing;
pub mod locks;
pub mod provider;
pub mod pruner;
pub mod refresh;
pub mod registry;
pub mod repos;
