pub mod annotations;
pub mod collection;
pub mod record;
pub mod value;

pub use annotations::Annotations;
pub use collection::Collection;
pub use record::{Model, ModelKey, ID_PROPERTY};
pub use value::{RecordId, Value};
