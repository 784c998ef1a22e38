//! The decoded, read-only representation of an image.
//!
//! Ownership is a strict tree: [`Image`] → [`Arch`] → [`LoadCommand`] →
//! sections. Nothing is shared and nothing changes once the parser has
//! returned.

use std::path::PathBuf;

use crate::endian;
use crate::ffi::*;

/// A decoded Mach-O file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub path: PathBuf,
    pub header: Header,
    /// One entry for a single-architecture image, one per FAT descriptor
    /// otherwise, in descriptor order.
    pub archs: Vec<Arch>,
}

impl Image {
    pub fn is_fat(&self) -> bool {
        matches!(self.header, Header::Fat(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    Mach(MachHeader),
    Mach64(MachHeader64),
    Fat(FatHeader),
}

impl Header {
    pub fn magic(&self) -> u32 {
        match self {
            Header::Mach(h) => h.magic,
            Header::Mach64(h) => h.magic,
            Header::Fat(h) => h.magic,
        }
    }

    pub fn cputype(&self) -> Option<i32> {
        match self {
            Header::Mach(h) => Some(h.cputype),
            Header::Mach64(h) => Some(h.cputype),
            Header::Fat(_) => None,
        }
    }

    /// Declared (command count, command table size); `None` for FAT headers.
    pub fn commands(&self) -> Option<(u32, u32)> {
        match self {
            Header::Mach(h) => Some((h.ncmds, h.sizeofcmds)),
            Header::Mach64(h) => Some((h.ncmds, h.sizeofcmds)),
            Header::Fat(_) => None,
        }
    }

    /// Number of architectures the header describes.
    pub fn nfat_arch(&self) -> u32 {
        match self {
            Header::Fat(h) => h.nfat_arch,
            _ => 1,
        }
    }
}

/// One architecture: the whole file for single images, or one embedded
/// image of a FAT container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arch {
    /// Magic exactly as read from the file, before normalization.
    pub magic: u32,
    pub header: Header,
    /// The FAT descriptor this architecture was found through, if any.
    pub fat_arch: Option<FatArch64>,
    pub load_commands: Vec<LoadCommand>,
}

impl Arch {
    pub fn cpu_type_name(&self) -> Option<&'static str> {
        self.header.cputype().and_then(cpu_type_name)
    }

    /// Paths of every library loaded through `LC_LOAD_DYLIB` or
    /// `LC_LOAD_WEAK_DYLIB`, in load command order.
    pub fn shared_libraries(&self) -> Vec<&str> {
        self.load_commands
            .iter()
            .filter_map(|lc| match &lc.command {
                Command::LoadDylib { name, .. } | Command::LoadWeakDylib { name, .. } => {
                    Some(name.as_str())
                }
                _ => None,
            })
            .collect()
    }
}

pub fn cpu_type_name(cputype: i32) -> Option<&'static str> {
    match cputype {
        CPU_TYPE_X86 => Some("CPU_TYPE_X86"),
        CPU_TYPE_X86_64 => Some("CPU_TYPE_X86_64"),
        CPU_TYPE_ARM => Some("CPU_TYPE_ARM"),
        CPU_TYPE_ARM64 => Some("CPU_TYPE_ARM64"),
        CPU_TYPE_POWERPC => Some("CPU_TYPE_POWERPC"),
        CPU_TYPE_POWERPC64 => Some("CPU_TYPE_POWERPC64"),
        _ => None,
    }
}

/// A decoded load command together with its architecture's swap flag.
///
/// The flag is needed to render packed character fields, which are kept
/// exactly as they sit in the normalized command table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCommand {
    pub command: Command,
    pub swapped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Segment {
        segment: SegmentCommand,
        sections: Vec<Section>,
    },
    Segment64 {
        segment: SegmentCommand64,
        sections: Vec<Section64>,
    },
    Uuid(UuidCommand),
    DyldInfoOnly(DyldInfoCommand),
    Symtab(SymtabCommand),
    Dysymtab(DysymtabCommand),
    LoadDylinker {
        command: DylinkerCommand,
        name: String,
    },
    VersionMinMacosx(VersionMinCommand),
    SourceVersion(SourceVersionCommand),
    Main(EntryPointCommand),
    LoadDylib {
        command: DylibCommand,
        name: String,
    },
    LoadWeakDylib {
        command: DylibCommand,
        name: String,
    },
    FunctionStarts(LinkeditDataCommand),
    DataInCode(LinkeditDataCommand),
    UnixThread(ThreadCommand),
    CodeSignature(LinkeditDataCommand),
    BuildVersion(BuildVersionCommand),
    /// A tag this decoder does not know, kept with its whole payload.
    Unknown { cmd: u32, data: Vec<u8> },
}

impl LoadCommand {
    /// The `LC_*` name of the command.
    pub fn name(&self) -> &'static str {
        match &self.command {
            Command::Segment { .. } => "LC_SEGMENT",
            Command::Segment64 { .. } => "LC_SEGMENT_64",
            Command::Uuid(_) => "LC_UUID",
            Command::DyldInfoOnly(_) => "LC_DYLD_INFO_ONLY",
            Command::Symtab(_) => "LC_SYMTAB",
            Command::Dysymtab(_) => "LC_DYSYMTAB",
            Command::LoadDylinker { .. } => "LC_LOAD_DYLINKER",
            Command::VersionMinMacosx(_) => "LC_VERSION_MIN_MACOSX",
            Command::SourceVersion(_) => "LC_SOURCE_VERSION",
            Command::Main(_) => "LC_MAIN",
            Command::LoadDylib { .. } => "LC_LOAD_DYLIB",
            Command::LoadWeakDylib { .. } => "LC_LOAD_WEAK_DYLIB",
            Command::FunctionStarts(_) => "LC_FUNCTION_STARTS",
            Command::DataInCode(_) => "LC_DATA_IN_CODE",
            Command::UnixThread(_) => "LC_UNIXTHREAD",
            Command::CodeSignature(_) => "LC_CODE_SIGNATURE",
            Command::BuildVersion(_) => "LC_BUILD_VERSION",
            Command::Unknown { .. } => "UNKNOWN_COMMAND",
        }
    }

    pub fn cmd(&self) -> u32 {
        self.header().cmd
    }

    pub fn cmdsize(&self) -> u32 {
        self.header().cmdsize
    }

    fn header(&self) -> LoadCommandHeader {
        let (cmd, cmdsize) = match &self.command {
            Command::Segment { segment, .. } => (segment.cmd, segment.cmdsize),
            Command::Segment64 { segment, .. } => (segment.cmd, segment.cmdsize),
            Command::Uuid(c) => (c.cmd, c.cmdsize),
            Command::DyldInfoOnly(c) => (c.cmd, c.cmdsize),
            Command::Symtab(c) => (c.cmd, c.cmdsize),
            Command::Dysymtab(c) => (c.cmd, c.cmdsize),
            Command::LoadDylinker { command, .. } => (command.cmd, command.cmdsize),
            Command::VersionMinMacosx(c) => (c.cmd, c.cmdsize),
            Command::SourceVersion(c) => (c.cmd, c.cmdsize),
            Command::Main(c) => (c.cmd, c.cmdsize),
            Command::LoadDylib { command, .. } | Command::LoadWeakDylib { command, .. } => {
                (command.cmd, command.cmdsize)
            }
            Command::FunctionStarts(c) | Command::DataInCode(c) | Command::CodeSignature(c) => {
                (c.cmd, c.cmdsize)
            }
            Command::UnixThread(c) => (c.cmd, c.cmdsize),
            Command::BuildVersion(c) => (c.cmd, c.cmdsize),
            Command::Unknown { cmd, data } => (*cmd, data.len() as u32),
        };
        LoadCommandHeader { cmd, cmdsize }
    }
}

impl SegmentCommand {
    pub fn name(&self, swapped: bool) -> String {
        endian::fixed_str(&self.segname, swapped)
    }
}

impl SegmentCommand64 {
    pub fn name(&self, swapped: bool) -> String {
        endian::fixed_str(&self.segname, swapped)
    }
}

impl Section {
    pub fn name(&self, swapped: bool) -> String {
        endian::fixed_str(&self.sectname, swapped)
    }

    pub fn segment_name(&self, swapped: bool) -> String {
        endian::fixed_str(&self.segname, swapped)
    }
}

impl Section64 {
    pub fn name(&self, swapped: bool) -> String {
        endian::fixed_str(&self.sectname, swapped)
    }

    pub fn segment_name(&self, swapped: bool) -> String {
        endian::fixed_str(&self.segname, swapped)
    }
}

impl UuidCommand {
    pub fn uuid_string(&self, swapped: bool) -> String {
        endian::uuid_string(&self.uuid, swapped)
    }
}
