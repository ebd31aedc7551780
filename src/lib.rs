pub mod attendance;
pub mod config;
pub mod fixture;
pub mod local_db;
pub mod model;
pub mod names;
pub mod provider;
pub mod roster;
pub mod scorers;
pub mod state;
pub mod store;
pub mod supabase;
