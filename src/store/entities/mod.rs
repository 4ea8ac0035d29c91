//! Metadata store entities

pub mod file_record;
