#![doc = include_str!("../README.md")]

pub mod descriptor;
pub mod toml_file;
