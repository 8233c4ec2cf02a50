pub mod block;
pub mod filter;
pub mod linker;
pub mod registry;
mod writer;

pub use block::BlockWriter;
pub use filter::{IdentityWriter, WriteFilter};
pub use linker::{LinkResolver, LinkStrategy};
pub use registry::{pad_with_zeros, FormatWriter, WriterRegistry};
pub use writer::{ArchiveWriter, WriterBuilder};
