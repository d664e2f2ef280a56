pub mod filters;
pub mod inventory;
pub mod results;
pub mod sessions;

pub use filters::*;
pub use inventory::*;
pub use results::*;
pub use sessions::*;
