pub mod entities;
pub mod error;
pub mod items;
pub mod scope;
