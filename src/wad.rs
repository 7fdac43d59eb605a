// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Reader for WAD2 (Quake) and WAD3 (Half-Life) texture archives.

use std::{
    collections::HashMap,
    io::{BufReader, Cursor, Read, Seek, SeekFrom},
};

use crate::{
    brush::{TextureInfo, TextureLookup},
    util,
};

use byteorder::{LittleEndian, ReadBytesExt};
use failure::Error;
use num_traits::FromPrimitive;

// see definition of lumpinfo_t:
// https://github.com/id-Software/Quake/blob/master/WinQuake/wad.h#L54-L63
const HEADER_SIZE: u64 = 12;
const LUMPINFO_SIZE: u64 = 32;
const LUMP_NAME_SIZE: usize = 16;

// miptex_t: 16-byte name, width, height, 4 mip offsets
const MIPTEX_HEADER_SIZE: usize = 40;

// WAD3 stores mip textures under the code WAD2 uses for sounds
const WAD3_MIPTEX: u8 = 0x43;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WadVersion {
    Wad2,
    Wad3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
pub enum LumpKind {
    Blank = 0,
    Label = 1,
    Palette = 0x40,
    QTex = 0x41,
    QPic = 0x42,
    Sound = 0x43,
    MipTex = 0x44,
    Font = 0x46,
}

impl LumpKind {
    fn from_code(version: WadVersion, code: u8) -> Option<LumpKind> {
        match (version, code) {
            (WadVersion::Wad3, WAD3_MIPTEX) => Some(LumpKind::MipTex),
            _ => LumpKind::from_u8(code),
        }
    }
}

pub struct Lump {
    name: String,
    kind: Option<LumpKind>,
    data: Box<[u8]>,
}

impl Lump {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lump's type, or `None` for unrecognized type codes.
    pub fn kind(&self) -> Option<LumpKind> {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

struct LumpInfo {
    offset: u32,
    size_on_disk: u32,
    kind: Option<LumpKind>,
    compression: u8,
    name: String,
}

pub struct Wad {
    version: WadVersion,

    // keyed by lowercase name
    lumps: HashMap<String, Lump>,
    textures: HashMap<String, TextureInfo>,
}

impl Wad {
    pub fn load<R>(data: R) -> Result<Wad, Error>
    where
        R: Read + Seek,
    {
        let mut reader = BufReader::new(data);
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        let version = match &magic.to_ascii_uppercase()[..] {
            b"WAD2" => WadVersion::Wad2,
            b"WAD3" => WadVersion::Wad3,
            _ => bail!(
                "Bad magic number for WAD: {}",
                String::from_utf8_lossy(&magic)
            ),
        };

        let lump_count = reader.read_u32::<LittleEndian>()? as u64;
        let lumpinfo_ofs = reader.read_u32::<LittleEndian>()? as u64;
        ensure!(
            lumpinfo_ofs >= HEADER_SIZE && lumpinfo_ofs + lump_count * LUMPINFO_SIZE <= file_len,
            "WAD directory ({} entries at {}) exceeds file size {}",
            lump_count,
            lumpinfo_ofs,
            file_len
        );

        reader.seek(SeekFrom::Start(lumpinfo_ofs))?;

        let mut lump_infos = Vec::with_capacity(lump_count as usize);
        for _ in 0..lump_count {
            let offset = reader.read_u32::<LittleEndian>()?;
            let size_on_disk = reader.read_u32::<LittleEndian>()?;
            let _size = reader.read_u32::<LittleEndian>()?;
            let code = reader.read_u8()?;
            let compression = reader.read_u8()?;
            let _pad = reader.read_u16::<LittleEndian>()?;
            let mut name_bytes = [0u8; LUMP_NAME_SIZE];
            reader.read_exact(&mut name_bytes)?;
            let name = util::read_cstring(&mut Cursor::new(&name_bytes[..]))?;

            ensure!(
                offset as u64 + size_on_disk as u64 <= file_len,
                "WAD lump {} ({} bytes at {}) exceeds file size {}",
                name,
                size_on_disk,
                offset,
                file_len
            );

            lump_infos.push(LumpInfo {
                offset,
                size_on_disk,
                kind: LumpKind::from_code(version, code),
                compression,
                name,
            });
        }

        let mut lumps = HashMap::new();
        let mut textures = HashMap::new();

        for info in lump_infos {
            if info.compression != 0 {
                warn!("Skipping compressed WAD lump {}", info.name);
                continue;
            }

            let mut data = Vec::with_capacity(info.size_on_disk as usize);
            reader.seek(SeekFrom::Start(info.offset as u64))?;
            (&mut reader)
                .take(info.size_on_disk as u64)
                .read_to_end(&mut data)?;

            let key = info.name.to_ascii_lowercase();
            if info.kind == Some(LumpKind::MipTex) {
                match read_miptex_info(&data) {
                    Ok(tex) => {
                        textures.insert(key.clone(), tex);
                    }
                    Err(e) => warn!("Bad mip texture {}: {}", info.name, e),
                }
            }

            trace!("WAD lump {} ({:?}, {} bytes)", info.name, info.kind, data.len());
            lumps.insert(
                key,
                Lump {
                    name: info.name,
                    kind: info.kind,
                    data: data.into_boxed_slice(),
                },
            );
        }

        debug!(
            "Loaded {:?} with {} lumps, {} textures",
            version,
            lumps.len(),
            textures.len()
        );

        Ok(Wad {
            version,
            lumps,
            textures,
        })
    }

    pub fn version(&self) -> WadVersion {
        self.version
    }

    pub fn len(&self) -> usize {
        self.lumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lumps.is_empty()
    }

    /// Looks up a lump by name, ignoring case.
    pub fn lump<S>(&self, name: S) -> Option<&Lump>
    where
        S: AsRef<str>,
    {
        self.lumps.get(&name.as_ref().to_ascii_lowercase())
    }

    /// Looks up a mip texture's dimensions by name, ignoring case.
    pub fn texture<S>(&self, name: S) -> Option<TextureInfo>
    where
        S: AsRef<str>,
    {
        self.textures
            .get(&name.as_ref().to_ascii_lowercase())
            .copied()
    }
}

impl TextureLookup for Wad {
    fn texture_info(&self, name: &str) -> Option<TextureInfo> {
        self.texture(name)
    }
}

fn read_miptex_info(data: &[u8]) -> Result<TextureInfo, Error> {
    ensure!(
        data.len() >= MIPTEX_HEADER_SIZE,
        "mip texture header truncated ({} bytes)",
        data.len()
    );

    let mut reader = Cursor::new(&data[LUMP_NAME_SIZE..]);
    let width = reader.read_u32::<LittleEndian>()?;
    let height = reader.read_u32::<LittleEndian>()?;
    ensure!(
        width > 0 && height > 0,
        "bad mip texture size {}x{}",
        width,
        height
    );

    Ok(TextureInfo { width, height })
}
