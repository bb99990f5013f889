pub mod backend;
pub mod cdp;
