use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use ::errors::{ErrorKind, Result, nom_to_result};
use ::parse::wad::{DIRECTORY_ENTRY_SIZE, HEADER_SIZE, wad_entry, wad_header};


/// Type of the WAD.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WADType {
    /// full standalone game
    IWAD,
    /// patch wad, a small mod
    PWAD,
}

impl WADType {
    fn tag(&self) -> &'static [u8; 4] {
        match *self {
            WADType::IWAD => b"IWAD",
            WADType::PWAD => b"PWAD",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BareWADHeader {
    pub identification: WADType,
    pub numlumps: u32,
    pub infotableofs: u32,
}

#[derive(Clone, Debug)]
pub struct BareWADDirectoryEntry {
    pub filepos: u32,
    pub size: u32,
    pub name: String,
}


/// An open WAD.  The header and directory are read once, up front, and never change afterwards;
/// lump contents are fetched on demand by seeking the underlying reader.
///
/// Names can repeat in a WAD.  Lookups by name always find the *last* entry with that name, which
/// is also how the engine resolves them.
pub struct WADArchive<R = File> {
    reader: R,
    header: BareWADHeader,
    directory: Vec<BareWADDirectoryEntry>,
    lumps: HashMap<String, usize>,
    // Level marker name -> index of the marker entry.  A marker is whatever sits right before a
    // THINGS lump; there's nothing else that identifies one.
    levels: BTreeMap<String, usize>,
}

impl WADArchive<File> {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        WADArchive::from_reader(file)
    }
}

impl<R: Read + Seek> WADArchive<R> {
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.seek(SeekFrom::Start(0))?;
        reader.read_exact(&mut buf)?;
        let header = match wad_header(&buf) {
            Ok((_, header)) => header,
            Err(_) => {
                bail!(ErrorKind::InvalidMagic(String::from_utf8_lossy(&buf[..4]).into_owned()));
            }
        };
        // PWADs are perfectly well-formed, but they only make sense layered over an IWAD, which
        // this crate doesn't do
        if header.identification != WADType::IWAD {
            bail!(ErrorKind::InvalidMagic("PWAD".to_owned()));
        }

        reader.seek(SeekFrom::Start(header.infotableofs as u64))?;
        let mut directory: Vec<BareWADDirectoryEntry> = Vec::new();
        let mut lumps = HashMap::new();
        let mut levels = BTreeMap::new();
        let mut record = [0u8; DIRECTORY_ENTRY_SIZE];
        // An over-declared count just runs us off the end of the file, which read_exact reports
        for i in 0..header.numlumps as usize {
            reader.read_exact(&mut record)?;
            let entry = nom_to_result("WAD directory", &record, wad_entry(&record))?;
            if entry.name == "THINGS" && i > 0 {
                levels.insert(directory[i - 1].name.clone(), i - 1);
            }
            lumps.insert(entry.name.clone(), i);
            directory.push(entry);
        }
        debug!("read {} directory entries, {} levels", directory.len(), levels.len());

        Ok(WADArchive {
            reader,
            header,
            directory,
            lumps,
            levels,
        })
    }

    pub fn header(&self) -> &BareWADHeader {
        &self.header
    }

    pub fn directory(&self) -> &[BareWADDirectoryEntry] {
        &self.directory
    }

    pub fn find_lump(&self, name: &str) -> Option<usize> {
        self.lumps.get(name).cloned()
    }

    pub fn lump_index(&self, name: &str) -> Result<usize> {
        Ok(self.find_lump(name).ok_or_else(|| ErrorKind::NotFound("lump", name.to_owned()))?)
    }

    /// Reads the whole of the named lump.
    pub fn lump_bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        let index = self.lump_index(name)?;
        self.lump_bytes_at(index)
    }

    /// Reads the whole of the lump at a directory position.
    pub fn lump_bytes_at(&mut self, index: usize) -> Result<Vec<u8>> {
        let (filepos, size) = match self.directory.get(index) {
            Some(entry) => (entry.filepos, entry.size),
            None => {
                bail!(ErrorKind::DataIntegrity("lump", index, self.directory.len()));
            }
        };
        self.reader.seek(SeekFrom::Start(filepos as u64))?;
        let mut data = Vec::new();
        self.reader.by_ref().take(size as u64).read_to_end(&mut data)?;
        if data.len() < size as usize {
            bail!(ErrorKind::TruncatedData(format!("lump {}", self.directory[index].name)));
        }
        Ok(data)
    }

    /// Names of every level in the archive, sorted.
    pub fn level_names(&self) -> Vec<&str> {
        self.levels.keys().map(|name| name.as_str()).collect()
    }

    /// Directory position of a level's marker entry.  The level's own lumps follow it.
    pub fn level_anchor(&self, name: &str) -> Result<usize> {
        Ok(self.levels.get(name).cloned().ok_or_else(|| ErrorKind::NotFound("level", name.to_owned()))?)
    }

    /// Whether the entry at a directory position is some level's marker.
    pub fn is_level_anchor(&self, index: usize) -> bool {
        self.levels.values().any(|&anchor| anchor == index)
    }

    /// Directory positions strictly between two marker lumps, e.g. F_START and F_END.
    pub fn entries_between(&self, begin_marker: &str, end_marker: &str) -> Result<Range<usize>> {
        let begin = self.lump_index(begin_marker)?;
        let end = self.lump_index(end_marker)?;
        if end <= begin {
            return Ok(begin..begin);
        }
        Ok((begin + 1)..end)
    }
}


/// Assembles a WAD from scratch: lump data in insertion order, then the directory.
pub struct WADBuilder {
    wadtype: WADType,
    lumps: Vec<(String, Vec<u8>)>,
}

impl WADBuilder {
    pub fn new(wadtype: WADType) -> Self {
        WADBuilder {
            wadtype,
            lumps: Vec::new(),
        }
    }

    pub fn add_lump<N, D>(&mut self, name: N, data: D) -> &mut Self
    where
        N: Into<String>,
        D: Into<Vec<u8>>,
    {
        self.lumps.push((name.into(), data.into()));
        self
    }

    /// Zero-length entries like map markers and F_START.
    pub fn add_marker<N: Into<String>>(&mut self, name: N) -> &mut Self {
        self.add_lump(name, Vec::new())
    }

    /// Writes the whole archive.  Every name is checked before anything is written.
    pub fn write_to(&self, writer: &mut Write) -> Result<()> {
        for &(ref name, _) in self.lumps.iter() {
            if name.len() > 8 {
                bail!("lump name {:?} is longer than 8 characters", name);
            }
        }
        let data_len: usize = self.lumps.iter().map(|&(_, ref data)| data.len()).sum();

        writer.write_all(self.wadtype.tag())?;
        writer.write_u32::<LittleEndian>(self.lumps.len() as u32)?;
        writer.write_u32::<LittleEndian>((HEADER_SIZE + data_len) as u32)?;
        for &(_, ref data) in self.lumps.iter() {
            writer.write_all(data)?;
        }

        let mut filepos = HEADER_SIZE;
        for &(ref name, ref data) in self.lumps.iter() {
            writer.write_u32::<LittleEndian>(filepos as u32)?;
            writer.write_u32::<LittleEndian>(data.len() as u32)?;
            write_name(writer, name)?;
            filepos += data.len();
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}

/// Writes an 8-byte, NUL-padded name field.
pub fn write_name(writer: &mut Write, name: &str) -> Result<()> {
    let bytes = name.as_bytes();
    let len = if bytes.len() > 8 { 8 } else { bytes.len() };
    writer.write_all(&bytes[..len])?;
    for _ in len .. 8 {
        writer.write_all(&[0])?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{WADArchive, WADBuilder, WADType};
    use ::errors::ErrorKind;

    fn five_entry_wad() -> Vec<u8> {
        let mut builder = WADBuilder::new(WADType::IWAD);
        builder
            .add_lump("PLAYPAL", vec![1u8, 2, 3])
            .add_marker("E1M2")
            .add_lump("THINGS", vec![0u8; 10])
            .add_marker("E1M1")
            .add_lump("THINGS", vec![9u8; 20]);
        builder.to_bytes().unwrap()
    }

    #[test]
    fn absent_name_is_not_found() {
        let mut wad = WADArchive::from_reader(Cursor::new(five_entry_wad())).unwrap();
        assert_eq!(wad.directory().len(), 5);
        match *wad.lump_bytes("COLORMAP").unwrap_err().kind() {
            ErrorKind::NotFound("lump", ref name) => assert_eq!(name, "COLORMAP"),
            ref other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn duplicate_names_resolve_to_last_entry() {
        let mut wad = WADArchive::from_reader(Cursor::new(five_entry_wad())).unwrap();
        assert_eq!(wad.lump_index("THINGS").unwrap(), 4);
        assert_eq!(wad.lump_bytes("THINGS").unwrap(), vec![9; 20]);
        assert_eq!(wad.lump_bytes_at(2).unwrap(), vec![0; 10]);
    }

    #[test]
    fn levels_are_detected_by_position_and_listed_sorted() {
        let wad = WADArchive::from_reader(Cursor::new(five_entry_wad())).unwrap();
        assert_eq!(wad.level_names(), vec!["E1M1", "E1M2"]);
        assert_eq!(wad.level_anchor("E1M1").unwrap(), 3);
        assert_eq!(wad.level_anchor("E1M2").unwrap(), 1);
        assert!(wad.level_anchor("E1M3").is_err());
        assert!(wad.is_level_anchor(1));
        assert!(!wad.is_level_anchor(2));
    }

    #[test]
    fn pwad_is_refused() {
        let mut builder = WADBuilder::new(WADType::PWAD);
        builder.add_lump("PLAYPAL", vec![0u8; 4]);
        let result = WADArchive::from_reader(Cursor::new(builder.to_bytes().unwrap()));
        match *result.err().unwrap().kind() {
            ErrorKind::InvalidMagic(_) => {}
            ref other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn garbage_magic_is_refused() {
        let mut buf = five_entry_wad();
        buf[0] = b'X';
        match *WADArchive::from_reader(Cursor::new(buf)).err().unwrap().kind() {
            ErrorKind::InvalidMagic(ref magic) => assert_eq!(magic, "XWAD"),
            ref other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn overdeclared_lump_count_is_an_io_error() {
        let mut buf = five_entry_wad();
        buf[4] = 6;
        match *WADArchive::from_reader(Cursor::new(buf)).err().unwrap().kind() {
            ErrorKind::Io(_) => {}
            ref other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn long_name_writes_nothing() {
        let mut builder = WADBuilder::new(WADType::IWAD);
        builder
            .add_lump("PLAYPAL", vec![0u8; 16])
            .add_lump("WAYTOOLONG", vec![1u8; 4]);
        let mut buf = Vec::new();
        assert!(builder.write_to(&mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn lump_running_past_the_end_is_truncated() {
        let mut buf = five_entry_wad();
        let len = buf.len();
        // Bump the declared size of the last lump (its size field sits 12 bytes from the end)
        buf[len - 12] = 0xff;
        let mut wad = WADArchive::from_reader(Cursor::new(buf)).unwrap();
        match *wad.lump_bytes_at(4).unwrap_err().kind() {
            ErrorKind::TruncatedData(_) => {}
            ref other => panic!("unexpected error {:?}", other),
        }
    }
}
