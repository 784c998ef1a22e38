//! On-disk record layouts.
//!
//! Every record is a fixed-size sequence of 32-bit words (64-bit fields and
//! character arrays are multiples of that), decoded by indexed access from a
//! buffer that has already been normalized to host byte order.

pub const MH_MAGIC: u32 = 0xfeedface;
pub const MH_CIGAM: u32 = 0xcefaedfe;
pub const MH_MAGIC_64: u32 = 0xfeedfacf;
pub const MH_CIGAM_64: u32 = 0xcffaedfe;
pub const FAT_MAGIC: u32 = 0xcafebabe;
pub const FAT_CIGAM: u32 = 0xbebafeca;
pub const FAT_MAGIC_64: u32 = 0xcafebabf;
pub const FAT_CIGAM_64: u32 = 0xbfbafeca;

pub const LC_REQ_DYLD: u32 = 0x80000000;

pub const LC_SEGMENT: u32 = 0x1;
pub const LC_SYMTAB: u32 = 0x2;
pub const LC_UNIXTHREAD: u32 = 0x5;
pub const LC_DYSYMTAB: u32 = 0xb;
pub const LC_LOAD_DYLIB: u32 = 0xc;
pub const LC_LOAD_DYLINKER: u32 = 0xe;
pub const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | LC_REQ_DYLD;
pub const LC_SEGMENT_64: u32 = 0x19;
pub const LC_UUID: u32 = 0x1b;
pub const LC_CODE_SIGNATURE: u32 = 0x1d;
pub const LC_DYLD_INFO_ONLY: u32 = 0x22 | LC_REQ_DYLD;
pub const LC_VERSION_MIN_MACOSX: u32 = 0x24;
pub const LC_FUNCTION_STARTS: u32 = 0x26;
pub const LC_MAIN: u32 = 0x28 | LC_REQ_DYLD;
pub const LC_DATA_IN_CODE: u32 = 0x29;
pub const LC_SOURCE_VERSION: u32 = 0x2a;
pub const LC_BUILD_VERSION: u32 = 0x32;

pub const CPU_ARCH_ABI64: i32 = 0x01000000;
pub const CPU_TYPE_X86: i32 = 7;
pub const CPU_TYPE_X86_64: i32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;
pub const CPU_TYPE_ARM: i32 = 12;
pub const CPU_TYPE_ARM64: i32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;
pub const CPU_TYPE_POWERPC: i32 = 18;
pub const CPU_TYPE_POWERPC64: i32 = CPU_TYPE_POWERPC | CPU_ARCH_ABI64;

/// Sequential reader over the words of a normalized record.
pub struct Fields<'a> {
    bytes: &'a [u8],
    pos: usize,
    swapped: bool,
}

impl<'a> Fields<'a> {
    fn new(bytes: &'a [u8], swapped: bool) -> Self {
        Self {
            bytes,
            pos: 0,
            swapped,
        }
    }

    fn take<T: Field>(&mut self) -> T {
        let value = T::from_bytes(&self.bytes[self.pos..self.pos + T::SIZE], self.swapped);
        self.pos += T::SIZE;
        value
    }
}

/// A single fixed-size field of a record.
pub trait Field: Sized {
    const SIZE: usize;
    fn from_bytes(bytes: &[u8], swapped: bool) -> Self;
}

impl Field for u32 {
    const SIZE: usize = 4;
    fn from_bytes(bytes: &[u8], _: bool) -> Self {
        u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Field for i32 {
    const SIZE: usize = 4;
    fn from_bytes(bytes: &[u8], _: bool) -> Self {
        i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Field for u64 {
    const SIZE: usize = 8;
    // Normalization only reverses 4-byte groups, so the two halves of a
    // 64-bit value from an opposite-endian image are still exchanged.
    fn from_bytes(bytes: &[u8], swapped: bool) -> Self {
        let mut buf = [0u8; 8];
        if swapped {
            buf[..4].copy_from_slice(&bytes[4..8]);
            buf[4..].copy_from_slice(&bytes[..4]);
        } else {
            buf.copy_from_slice(&bytes[..8]);
        }
        u64::from_ne_bytes(buf)
    }
}

impl Field for [u8; 16] {
    const SIZE: usize = 16;
    fn from_bytes(bytes: &[u8], _: bool) -> Self {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&bytes[..16]);
        buf
    }
}

/// A fixed-size on-disk record.
pub trait Record: Sized {
    const SIZE: usize;

    fn decode(fields: &mut Fields<'_>) -> Self;

    /// Decodes the record from the start of `bytes`, which must already be
    /// normalized. Returns `None` if `bytes` is shorter than the record.
    fn read(bytes: &[u8], swapped: bool) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self::decode(&mut Fields::new(bytes, swapped)))
    }
}

macro_rules! records {
    ($(
        $(#[$meta:meta])*
        pub struct $name:ident {
            $($(#[$fmeta:meta])* pub $field:ident: $ty:ty,)*
        }
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct $name {
                $($(#[$fmeta])* pub $field: $ty,)*
            }

            impl Record for $name {
                const SIZE: usize = 0 $(+ <$ty as Field>::SIZE)*;

                fn decode(fields: &mut Fields<'_>) -> Self {
                    Self { $($field: fields.take(),)* }
                }
            }
        )*
    };
}

records! {
    pub struct MachHeader {
        pub magic: u32,
        pub cputype: i32,
        pub cpusubtype: i32,
        pub filetype: u32,
        pub ncmds: u32,
        pub sizeofcmds: u32,
        pub flags: u32,
    }

    pub struct MachHeader64 {
        pub magic: u32,
        pub cputype: i32,
        pub cpusubtype: i32,
        pub filetype: u32,
        pub ncmds: u32,
        pub sizeofcmds: u32,
        pub flags: u32,
        pub reserved: u32,
    }

    pub struct FatHeader {
        pub magic: u32,
        pub nfat_arch: u32,
    }

    pub struct FatArch {
        pub cputype: i32,
        pub cpusubtype: i32,
        pub offset: u32,
        pub size: u32,
        pub align: u32,
    }

    pub struct FatArch64 {
        pub cputype: i32,
        pub cpusubtype: i32,
        pub offset: u64,
        pub size: u64,
        pub align: u32,
        pub reserved: u32,
    }

    /// The (tag, size) prefix shared by every load command.
    pub struct LoadCommandHeader {
        pub cmd: u32,
        pub cmdsize: u32,
    }

    pub struct SegmentCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        pub segname: [u8; 16],
        pub vmaddr: u32,
        pub vmsize: u32,
        pub fileoff: u32,
        pub filesize: u32,
        pub maxprot: i32,
        pub initprot: i32,
        pub nsects: u32,
        pub flags: u32,
    }

    pub struct SegmentCommand64 {
        pub cmd: u32,
        pub cmdsize: u32,
        pub segname: [u8; 16],
        pub vmaddr: u64,
        pub vmsize: u64,
        pub fileoff: u64,
        pub filesize: u64,
        pub maxprot: i32,
        pub initprot: i32,
        pub nsects: u32,
        pub flags: u32,
    }

    pub struct Section {
        pub sectname: [u8; 16],
        pub segname: [u8; 16],
        pub addr: u32,
        pub size: u32,
        pub offset: u32,
        pub align: u32,
        pub reloff: u32,
        pub nreloc: u32,
        pub flags: u32,
        /// Index into the indirect symbol table.
        pub reserved1: u32,
        pub reserved2: u32,
    }

    pub struct Section64 {
        pub sectname: [u8; 16],
        pub segname: [u8; 16],
        pub addr: u64,
        pub size: u64,
        pub offset: u32,
        pub align: u32,
        pub reloff: u32,
        pub nreloc: u32,
        pub flags: u32,
        /// Index into the indirect symbol table.
        pub reserved1: u32,
        pub reserved2: u32,
        pub reserved3: u32,
    }

    pub struct DylibCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        /// Offset of the library path, relative to the command start.
        pub name: u32,
        pub timestamp: u32,
        pub current_version: u32,
        pub compatibility_version: u32,
    }

    pub struct DylinkerCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        /// Offset of the linker path, relative to the command start.
        pub name: u32,
    }

    pub struct UuidCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        pub uuid: [u8; 16],
    }

    pub struct DyldInfoCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        pub rebase_off: u32,
        pub rebase_size: u32,
        pub bind_off: u32,
        pub bind_size: u32,
        pub weak_bind_off: u32,
        pub weak_bind_size: u32,
        pub lazy_bind_off: u32,
        pub lazy_bind_size: u32,
        pub export_off: u32,
        pub export_size: u32,
    }

    pub struct SymtabCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        pub symoff: u32,
        pub nsyms: u32,
        pub stroff: u32,
        pub strsize: u32,
    }

    pub struct DysymtabCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        pub ilocalsym: u32,
        pub nlocalsym: u32,
        pub iextdefsym: u32,
        pub nextdefsym: u32,
        pub iundefsym: u32,
        pub nundefsym: u32,
        pub tocoff: u32,
        pub ntoc: u32,
        pub modtaboff: u32,
        pub nmodtab: u32,
        pub extrefsymoff: u32,
        pub nextrefsyms: u32,
        pub indirectsymoff: u32,
        pub nindirectsyms: u32,
        pub extreloff: u32,
        pub nextrel: u32,
        pub locreloff: u32,
        pub nlocrel: u32,
    }

    /// Versions are packed as `xxxx.yy.zz` nibbles.
    pub struct VersionMinCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        pub version: u32,
        pub sdk: u32,
    }

    pub struct SourceVersionCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        pub version: u64,
    }

    pub struct EntryPointCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        pub entryoff: u64,
        pub stacksize: u64,
    }

    pub struct LinkeditDataCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        pub dataoff: u32,
        pub datasize: u32,
    }

    /// Only the prefix is decoded; the flavor/state pairs that follow are
    /// machine-specific.
    pub struct ThreadCommand {
        pub cmd: u32,
        pub cmdsize: u32,
    }

    pub struct BuildVersionCommand {
        pub cmd: u32,
        pub cmdsize: u32,
        pub platform: u32,
        pub minos: u32,
        pub sdk: u32,
        pub ntools: u32,
    }
}

impl From<FatArch> for FatArch64 {
    fn from(arch: FatArch) -> Self {
        Self {
            cputype: arch.cputype,
            cpusubtype: arch.cpusubtype,
            offset: arch.offset.into(),
            size: arch.size.into(),
            align: arch.align,
            reserved: 0,
        }
    }
}
