//! Extract numbered customer functions from a specification document and keep the
//! ones semantically related to driver assistance.

pub mod config;
pub mod db;
pub mod document;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod scoring;
