//! modpm - a mod package manager.
//!
//! Mods are published by sources (GitHub repositories, description URLs or
//! local description files). modpm resolves the dependencies of a mod
//! version, downloads its assets into a local cache and installs them into
//! the `mods` directory of a game, keeping a record of every file it wrote.

pub mod archive;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod installation;
pub mod installer;
pub mod progress;
pub mod repository;
pub mod resolver;
pub mod runtime;
pub mod version;

pub use error::ModInstallerError;
pub use installer::ModInstaller;
