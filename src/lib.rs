pub mod store;
pub mod format;
pub mod cursor;
pub mod marks;
pub mod flatten;
pub mod index;
pub mod decoder;
pub mod plugin;
pub mod session;
pub mod io_stream;

pub use store::ByteStore;
pub use format::Value;
pub use cursor::{Cursor, DecodeError, Endianness, ReadKind};
pub use marks::{Mark, MarkStore};
pub use flatten::{flatten, COLOR_COUNT};
pub use index::{Direction, FieldMap, Span, SpanView};
pub use decoder::{Decoder, Registry};
pub use plugin::PluginDecoder;
pub use session::{Annotated, Session};
pub use io_stream::{load, load_file, parse_size, LoadError, LoadOptions, SizeError};
