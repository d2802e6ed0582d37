pub mod job;
pub mod notification;
pub mod question;
pub mod source_document;
pub mod taxonomy;

pub use job::*;
pub use notification::*;
pub use question::*;
pub use source_document::*;
pub use taxonomy::FALLBACK_NAME;
