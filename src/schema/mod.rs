pub mod enum_def;
pub mod models;
