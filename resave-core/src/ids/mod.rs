//! The three identifier encodings used across save and plugin files, plus VSVal.

mod formid;
mod handle;
mod refid;
mod vsval;

pub use formid::{FormId, MasterList};
pub use handle::Handle;
pub use refid::{RefId, RefIdKind};
pub use vsval::VsVal;
