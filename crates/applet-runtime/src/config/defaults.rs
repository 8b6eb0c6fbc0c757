//! Compile-time configuration defaults
//!
//! Generated by `build.rs` from the library defaults, merged with the file
//! named by `APPLET_CONFIG_RS` when that variable is set at build time.

include!(concat!(env!("OUT_DIR"), "/applet_merged_config.rs"));
