pub mod admin;
pub mod ai;
pub mod auth;
pub mod complaints;
pub mod core;
pub mod dashboard;
pub mod doubts;
pub mod maintenance;
pub mod quiz;
