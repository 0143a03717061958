// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

pub mod command;
pub mod connection;
pub mod stream;

pub use command::CommandEngine;
pub use connection::{Connection, ReaderContext};
