pub mod app;
pub mod client;
pub mod favorites;
pub mod models;
pub mod queries;
pub mod query;
pub mod storage;
pub mod tmdb;
