//! CLI subcommands.

pub mod build;
pub mod bundle;
pub mod dev;
pub mod init;
pub mod ls;
pub mod mirror;
pub mod serve;
