pub mod common;
pub mod io;
