use std::io;

use nom::{self, IResult};

error_chain! {
    foreign_links {
        Io(io::Error);
    }

    errors {
        ParseError(whence: String, offset: usize) {
            description("malformed data")
            display("malformed data at byte {} while parsing {}", offset, whence)
        }
        TruncatedData(whence: String) {
            description("unexpected end of input")
            display("unexpected end of input while parsing {}", whence)
        }
        InvalidMagic(magic: String) {
            description("invalid magic")
            display("invalid magic {:?}; only IWAD archives are supported", magic)
        }
        NotFound(what: &'static str, name: String) {
            description("no such entry")
            display("no such {}: {}", what, name)
        }
        OversizedImage(name: String, width: i16, height: i16) {
            description("picture dimensions out of range")
            display("picture {} has unusable dimensions {}x{}", name, width, height)
        }
        DataIntegrity(what: &'static str, index: usize, len: usize) {
            description("reference out of range")
            display("{} index {} is out of range; only {} exist", what, index, len)
        }
        CyclicTree(node: usize) {
            description("malformed BSP tree")
            display("BSP node {} is reachable more than once; the tree is cyclic", node)
        }
        NegativeOffset(lump: String, index: usize, value: isize) {
            description("nonsensical negative offset")
            display("found nonsensical negative offset {} in position {} while reading {}", value, index, lump)
        }
    }
}

/// Unwraps a nom result into one of ours, translating running out of input into `TruncatedData`
/// and anything else into a `ParseError` pointing at the offending byte of `buf`.
pub fn nom_to_result<'a, O, W>(whence: W, buf: &'a [u8], result: IResult<&'a [u8], O>) -> Result<O>
where
    W: Into<String>,
{
    match result {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Incomplete(_)) => {
            bail!(ErrorKind::TruncatedData(whence.into()));
        }
        Err(nom::Err::Error(context)) | Err(nom::Err::Failure(context)) => {
            let offset = match context {
                nom::Context::Code(rest, _) => buf.len().saturating_sub(rest.len()),
                _ => 0,
            };
            bail!(ErrorKind::ParseError(whence.into(), offset));
        }
    }
}
