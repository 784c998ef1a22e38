use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::{debug, trace, warn};

use crate::endian;
use crate::error::{Error, Result};
use crate::ffi::*;
use crate::model::{Arch, Command, Header, Image, LoadCommand};
use crate::source::ByteSource;

/// Decodes the Mach-O file at `path`.
///
/// The file is opened once and closed before returning, whether the parse
/// succeeds or not.
pub fn parse<P: AsRef<Path>>(path: P) -> Result<Image> {
    Parser::open(path)?.parse()
}

/// Decoder for a single image, single-architecture or FAT.
pub struct Parser<R> {
    source: ByteSource<R>,
}

impl Parser<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            source: ByteSource::open(path)?,
        })
    }
}

impl<R: Read + Seek> Parser<R> {
    /// Creates a parser over an arbitrary reader. `path` is recorded in the
    /// resulting [`Image`] and in errors.
    pub fn new<P: AsRef<Path>>(reader: R, path: P) -> Self {
        Self {
            source: ByteSource::new(reader, path),
        }
    }

    pub fn parse(mut self) -> Result<Image> {
        let (magic, header, swap) = self.parse_header(0)?;

        let archs = match header {
            Header::Fat(fat) => {
                let sixty_four = magic == FAT_MAGIC_64 || magic == FAT_CIGAM_64;
                self.parse_archs(&fat, sixty_four, swap)?
            }
            _ => vec![self.parse_arch(magic, header, swap, None)?],
        };

        Ok(Image {
            path: self.source.path().to_path_buf(),
            header,
            archs,
        })
    }

    /// Classifies the magic at `start` and decodes the header record that
    /// goes with it. Leaves the cursor right after the header.
    fn parse_header(&mut self, start: u64) -> Result<(u32, Header, bool)> {
        self.source.seek(start)?;
        let bytes = self.source.read(4)?;
        let magic = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.source.seek(start)?;

        let (header, swap) = match magic {
            MH_MAGIC | MH_CIGAM => {
                let swap = magic == MH_CIGAM;
                (Header::Mach(self.source.read_record(swap)?), swap)
            }
            MH_MAGIC_64 | MH_CIGAM_64 => {
                let swap = magic == MH_CIGAM_64;
                (Header::Mach64(self.source.read_record(swap)?), swap)
            }
            FAT_MAGIC | FAT_CIGAM | FAT_MAGIC_64 | FAT_CIGAM_64 => {
                let swap = magic == FAT_CIGAM || magic == FAT_CIGAM_64;
                (Header::Fat(self.source.read_record(swap)?), swap)
            }
            _ => return Err(Error::UnknownFormat { magic }),
        };

        debug!(
            "{}: magic {:#010x} at {:#x}, swap: {}",
            self.source.path().display(),
            magic,
            start,
            swap
        );

        Ok((magic, header, swap))
    }

    /// Walks the FAT descriptor table, decoding the image each descriptor
    /// points at. The cursor must be right after the FAT header.
    fn parse_archs(&mut self, header: &FatHeader, sixty_four: bool, swap: bool) -> Result<Vec<Arch>> {
        let mut archs = Vec::new();

        for index in 0..header.nfat_arch {
            let fat_arch: FatArch64 = if sixty_four {
                self.source.read_record(swap)?
            } else {
                self.source.read_record::<FatArch>(swap)?.into()
            };
            let next = self.source.position()?;

            debug!(
                "fat arch {}: cputype {:#x}, offset {:#x}, size {:#x}",
                index, fat_arch.cputype, fat_arch.offset, fat_arch.size
            );

            let (magic, arch_header, arch_swap) = self.parse_header(fat_arch.offset)?;
            archs.push(self.parse_arch(magic, arch_header, arch_swap, Some(fat_arch))?);

            self.source.seek(next)?;
        }

        Ok(archs)
    }

    /// Decodes the load commands following `header`. The cursor must be
    /// right after the header.
    fn parse_arch(
        &mut self,
        magic: u32,
        header: Header,
        swap: bool,
        fat_arch: Option<FatArch64>,
    ) -> Result<Arch> {
        // A FAT container nested inside another one has no load commands.
        let (ncmds, sizeofcmds) = header.commands().ok_or(Error::UnknownFormat { magic })?;

        let load_commands = self
            .parse_load_commands(ncmds, sizeofcmds, swap)?
            .into_iter()
            .map(|command| LoadCommand {
                command,
                swapped: swap,
            })
            .collect();

        Ok(Arch {
            magic,
            header,
            fat_arch,
            load_commands,
        })
    }

    fn parse_load_commands(&mut self, ncmds: u32, sizeofcmds: u32, swap: bool) -> Result<Vec<Command>> {
        let base = self.source.position()?;
        let mut data = self.source.read(sizeofcmds as usize)?;
        if swap {
            endian::normalize(&mut data);
        }

        let table = CommandTable {
            data: &data,
            base,
            swap,
        };

        let mut offset = 0usize;
        let mut commands = Vec::new();

        for _ in 0..ncmds {
            let lc: LoadCommandHeader = table.record(offset)?;
            trace!(
                "load command at {:#x}: cmd {:#x}, cmdsize {}",
                base + offset as u64,
                lc.cmd,
                lc.cmdsize
            );
            let command = table.command(offset, lc)?;
            // The size is trusted as-is: a bogus cmdsize shifts every
            // following command in this table.
            offset += lc.cmdsize as usize;
            commands.push(command);
        }

        if offset != sizeofcmds as usize {
            warn!(
                "load commands at {:#x} span {} bytes, header declares {}",
                base, offset, sizeofcmds
            );
        }

        Ok(commands)
    }
}

/// The normalized bytes of one architecture's load command table.
struct CommandTable<'a> {
    data: &'a [u8],
    /// File offset of the table, only used in errors.
    base: u64,
    swap: bool,
}

impl CommandTable<'_> {
    fn record<T: Record>(&self, offset: usize) -> Result<T> {
        self.data
            .get(offset..)
            .and_then(|bytes| T::read(bytes, self.swap))
            .ok_or_else(|| self.short_read(offset, T::SIZE))
    }

    fn window(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| self.short_read(offset, len))
    }

    /// Resolves a string stored `str_offset` bytes into the command at
    /// `offset`. The string ends at the first null or at the end of the
    /// command.
    fn string(&self, offset: usize, str_offset: u32, cmdsize: u32) -> String {
        let start = offset.saturating_add(str_offset as usize);
        let end = offset
            .saturating_add(cmdsize as usize)
            .min(self.data.len());
        if start >= end {
            return String::new();
        }
        endian::fixed_str(&self.data[start..end], self.swap)
    }

    fn sections<T: Record>(&self, offset: usize, header_size: usize, nsects: u32) -> Result<Vec<T>> {
        (0..nsects as usize)
            .map(|i| self.record(offset + header_size + i * T::SIZE))
            .collect()
    }

    fn command(&self, offset: usize, lc: LoadCommandHeader) -> Result<Command> {
        let command = match lc.cmd {
            LC_SEGMENT => {
                let segment: SegmentCommand = self.record(offset)?;
                let sections = self.sections(offset, SegmentCommand::SIZE, segment.nsects)?;
                Command::Segment { segment, sections }
            }
            LC_SEGMENT_64 => {
                let segment: SegmentCommand64 = self.record(offset)?;
                let sections = self.sections(offset, SegmentCommand64::SIZE, segment.nsects)?;
                Command::Segment64 { segment, sections }
            }
            LC_UUID => Command::Uuid(self.record(offset)?),
            LC_DYLD_INFO_ONLY => Command::DyldInfoOnly(self.record(offset)?),
            LC_SYMTAB => Command::Symtab(self.record(offset)?),
            LC_DYSYMTAB => Command::Dysymtab(self.record(offset)?),
            LC_LOAD_DYLINKER => {
                let command: DylinkerCommand = self.record(offset)?;
                let name = self.string(offset, command.name, command.cmdsize);
                Command::LoadDylinker { command, name }
            }
            LC_VERSION_MIN_MACOSX => Command::VersionMinMacosx(self.record(offset)?),
            LC_SOURCE_VERSION => Command::SourceVersion(self.record(offset)?),
            LC_MAIN => Command::Main(self.record(offset)?),
            LC_LOAD_DYLIB | LC_LOAD_WEAK_DYLIB => {
                let command: DylibCommand = self.record(offset)?;
                let name = self.string(offset, command.name, command.cmdsize);
                if lc.cmd == LC_LOAD_DYLIB {
                    Command::LoadDylib { command, name }
                } else {
                    Command::LoadWeakDylib { command, name }
                }
            }
            LC_FUNCTION_STARTS => Command::FunctionStarts(self.record(offset)?),
            LC_DATA_IN_CODE => Command::DataInCode(self.record(offset)?),
            LC_UNIXTHREAD => Command::UnixThread(self.record(offset)?),
            LC_CODE_SIGNATURE => Command::CodeSignature(self.record(offset)?),
            LC_BUILD_VERSION => Command::BuildVersion(self.record(offset)?),
            cmd => Command::Unknown {
                cmd,
                data: self.window(offset, lc.cmdsize as usize)?.to_vec(),
            },
        };
        Ok(command)
    }

    fn short_read(&self, offset: usize, expected: usize) -> Error {
        Error::ShortRead {
            offset: self.base + offset as u64,
            expected,
            available: self.data.len().saturating_sub(offset),
        }
    }
}
