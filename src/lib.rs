#![allow(dead_code)] // API surface kept for the headless CLI and future panels
#![allow(clippy::too_many_arguments)]

pub mod app;
pub mod assets;
pub mod cli;
pub mod components;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod surface;
