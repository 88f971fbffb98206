pub mod cli;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod eval;
pub mod experiment;
pub mod generator;
pub mod hyde;
pub mod index;
pub mod metrics;
pub mod runfile;
pub mod search;
