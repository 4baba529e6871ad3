// C/C++ extension host library - exposes all core modules for testing

pub mod clients;
pub mod config;
pub mod extension;
pub mod host;
pub mod language_config;
pub mod services;
pub mod settings;
pub mod snippets;
pub mod types;
