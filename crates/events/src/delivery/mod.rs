//! External delivery channels.

pub mod push;
