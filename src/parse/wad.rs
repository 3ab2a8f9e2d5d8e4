use nom::le_u32;

use super::util::fixed_length_ascii;
use ::archive::wad::{BareWADDirectoryEntry, BareWADHeader, WADType};


/// Size of the header at the very start of a WAD.
pub const HEADER_SIZE: usize = 12;
/// Size of a single directory record.
pub const DIRECTORY_ENTRY_SIZE: usize = 16;

named!(iwad_tag<WADType>, value!(WADType::IWAD, tag!(b"IWAD")));
named!(pwad_tag<WADType>, value!(WADType::PWAD, tag!(b"PWAD")));

named!(pub wad_header<BareWADHeader>, do_parse!(
    identification: alt!(iwad_tag | pwad_tag) >>
    numlumps: le_u32 >>
    infotableofs: le_u32 >>
    (BareWADHeader{ identification, numlumps, infotableofs })
));

named!(pub wad_entry<BareWADDirectoryEntry>, do_parse!(
    filepos: le_u32 >>
    size: le_u32 >>
    name: apply!(fixed_length_ascii, 8) >>
    (BareWADDirectoryEntry{ filepos, size, name: name.into_owned() })
));
