pub mod combos;
pub mod error;
pub mod filter;
pub mod fold;
pub mod model;
pub mod sentinel;

pub use error::BackendError;
pub use model::{
    CascadeReport, Combo, ComboResult, ComboStatus, DropdownOption, Level, Plan, ResultItem,
    Summary, WidgetKind,
};
