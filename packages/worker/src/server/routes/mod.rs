// HTTP routes
pub mod health;
pub mod run;

pub use health::*;
pub use run::*;
