//! gopherd - minimal Gopher responder
//!
//! Serves `.gopher` menus and text files from a confined directory tree.

pub mod config;
pub mod confine;
pub mod gopher;
pub mod privilege;
pub mod server;
