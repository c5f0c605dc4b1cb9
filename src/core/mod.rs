// src/core/mod.rs

pub mod arg_parser;
pub mod config;
pub mod dispatch;
pub mod issues;
pub mod options;
pub mod properties;
pub mod schema;
pub mod task;
pub mod task_file;
pub mod template;
