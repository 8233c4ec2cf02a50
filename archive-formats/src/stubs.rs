//! Format slots that exist for registry completeness but never bid:
//! `iso9660`, `mtree`, `shar`, `xar`. Every real archive on the stream
//! loses the bidding to one of the implemented formats above; these
//! only ever run if the caller explicitly asks to write one of them,
//! at which point they report a clear "not implemented" fatal error
//! rather than silently producing garbage.

use archive_core::entry::Entry;
use archive_core::error::Result;
use archive_core::read::{DataBlock, FormatReader, HeaderOutcome, ReadFilter};
use archive_core::write::{FormatWriter, WriteFilter};

use crate::error::FormatError;

macro_rules! stub_format {
    ($reader:ident, $writer:ident, $name:expr) => {
        #[derive(Default)]
        pub struct $reader;

        impl FormatReader for $reader {
            fn name(&self) -> &'static str {
                $name
            }

            fn bid(&mut self, _pipe: &mut dyn ReadFilter) -> Result<i64> {
                Ok(0)
            }

            fn read_header(&mut self, _pipe: &mut dyn ReadFilter, _entry: &mut Entry) -> Result<HeaderOutcome> {
                Err(FormatError::NotImplemented { format: $name }.into())
            }

            fn read_data(&mut self, _pipe: &mut dyn ReadFilter) -> Result<Option<DataBlock>> {
                Err(FormatError::NotImplemented { format: $name }.into())
            }
        }

        #[derive(Default)]
        pub struct $writer;

        impl FormatWriter for $writer {
            fn name(&self) -> &'static str {
                $name
            }

            fn write_header(&mut self, _pipe: &mut dyn WriteFilter, _entry: &Entry) -> Result<()> {
                Err(FormatError::NotImplemented { format: $name }.into())
            }

            fn write_data(&mut self, _pipe: &mut dyn WriteFilter, _buf: &[u8]) -> Result<usize> {
                Err(FormatError::NotImplemented { format: $name }.into())
            }

            fn finish_entry(&mut self, _pipe: &mut dyn WriteFilter) -> Result<()> {
                Err(FormatError::NotImplemented { format: $name }.into())
            }
        }
    };
}

stub_format!(Iso9660Reader, Iso9660Writer, "iso9660");
stub_format!(MtreeReader, MtreeWriter, "mtree");
stub_format!(SharReader, SharWriter, "shar");
stub_format!(XarReader, XarWriter, "xar");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stubs_never_win_the_bid() {
        struct Empty;
        impl ReadFilter for Empty {
            fn name(&self) -> &str {
                "empty"
            }
            fn read_ahead(&mut self, _min: usize) -> Result<&[u8]> {
                Ok(&[])
            }
            fn consume(&mut self, _n: usize) -> Result<usize> {
                Ok(0)
            }
            fn close(&mut self) -> Result<()> {
                Ok(())
            }
            fn bytes_consumed(&self) -> u64 {
                0
            }
        }
        let mut pipe = Empty;
        assert_eq!(Iso9660Reader.bid(&mut pipe).unwrap(), 0);
        assert_eq!(MtreeReader.bid(&mut pipe).unwrap(), 0);
        assert_eq!(SharReader.bid(&mut pipe).unwrap(), 0);
        assert_eq!(XarReader.bid(&mut pipe).unwrap(), 0);
    }
}
