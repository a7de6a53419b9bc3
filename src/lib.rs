//! Michelin crawler: crawl the restaurant guide and its web archive
//! captures, and reconcile every observation into a per-restaurant award
//! timeline.

pub mod archive;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod merge;
pub mod migrations;
pub mod models;
pub mod parser;
pub mod repository;
pub mod schema;
pub mod scrapers;
