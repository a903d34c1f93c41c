//! Session input and Emissary data structures.

pub mod report;
pub mod route;
pub mod scan;
pub mod session;
