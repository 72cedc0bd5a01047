//! MaxDB data types, value conversion and result rows.

mod data_type;
mod lob;
mod row;
mod translator;
mod value;

pub use data_type::DataType;
pub use lob::{LongDescriptor, LongKind, LongValue};
pub use row::Row;
pub use translator::{FieldInfo, Translator};
pub use value::MaxDbValue;
