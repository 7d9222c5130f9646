pub mod config;
pub mod opener;
