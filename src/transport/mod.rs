//! Front ends: terminal chat and the HTTP chat API

pub mod cli;
pub mod http;
