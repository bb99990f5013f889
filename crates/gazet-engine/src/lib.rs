pub mod cli;
pub mod config;
pub mod discovery;
pub mod dropdown;
pub mod executor;
pub mod extract;
pub mod inspect;
pub mod page;
pub mod parallel;
pub mod persist;
pub mod plan;
pub mod ready;
pub mod script;
pub mod selector;
pub mod wait;

pub use gazet_common::combos;
pub use gazet_common::error::BackendError;
pub use gazet_common::filter;
pub use gazet_common::model;
pub use gazet_common::sentinel;
