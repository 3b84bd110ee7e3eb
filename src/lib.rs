pub mod app;
pub mod config;
pub mod db;
pub mod domain;
pub mod feeds;
pub mod infrastructure;
pub mod model;
pub mod policy;
pub mod rules;
pub mod scan;
pub mod tasks;
pub mod training;
