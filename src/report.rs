//! Human-readable rendering of a decoded [`Image`].

use std::io::{self, Write};

use crossterm::style::Stylize;

use crate::ffi::*;
use crate::model::{Arch, Command, Header, Image, LoadCommand};

/// Which sections of the report to print.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    pub mach_header: bool,
    pub load_commands: bool,
    pub shared_libs: bool,
}

/// Renders images as otool-like text.
pub struct Report {
    options: ReportOptions,
    color: bool,
}

impl Report {
    pub fn new(options: ReportOptions) -> Self {
        Self {
            options,
            color: false,
        }
    }

    /// Enables ANSI styling of headings.
    pub fn color(mut self, yes: bool) -> Self {
        self.color = yes;
        self
    }

    pub fn render<W: Write>(&self, image: &Image, out: &mut W) -> io::Result<()> {
        self.summary(image, out)?;

        if self.options.mach_header {
            self.mach_header(image, out)?;
        }

        if self.options.load_commands {
            if image.archs.len() > 1 {
                for (index, arch) in image.archs.iter().enumerate() {
                    writeln!(out, "{}", self.heading(&format!("Load commands for Arch {}", index)))?;
                    self.load_commands(arch, out)?;
                }
            } else {
                writeln!(out, "{}", self.heading("Load commands"))?;
                for arch in &image.archs {
                    self.load_commands(arch, out)?;
                }
            }
        }

        if self.options.shared_libs {
            for (index, arch) in image.archs.iter().enumerate() {
                if image.archs.len() > 1 {
                    writeln!(
                        out,
                        "{}",
                        self.heading(&format!("Shared libraries for Arch {}", index))
                    )?;
                }
                let libs = arch.shared_libraries();
                if libs.is_empty() {
                    writeln!(out, "No load dylib load command found")?;
                }
                for lib in libs {
                    writeln!(out, "{}", lib)?;
                }
            }
        }

        Ok(())
    }

    fn heading(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn summary<W: Write>(&self, image: &Image, out: &mut W) -> io::Result<()> {
        let kind = if image.is_fat() {
            "FAT Image"
        } else {
            "Single Image"
        };
        let kind = if self.color {
            kind.red().to_string()
        } else {
            kind.to_string()
        };

        write!(out, "Image<{}>: {}", image.path.display(), kind)?;
        if image.archs.len() == 1 {
            writeln!(out, ", {}", describe_arch(&image.archs[0]))?;
        } else {
            writeln!(out)?;
            for (index, arch) in image.archs.iter().enumerate() {
                writeln!(out, "Arch {}: {}", index, describe_arch(arch))?;
            }
        }
        Ok(())
    }

    fn mach_header<W: Write>(&self, image: &Image, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", self.heading("Mach header"))?;
        match &image.header {
            Header::Fat(header) => {
                writeln!(out, "Fat headers")?;
                writeln!(out, "fat_magic {:#x}", image.header.magic())?;
                writeln!(out, "nfat_arch {}", header.nfat_arch)?;
                for (index, arch) in image.archs.iter().enumerate() {
                    if let Some(fat_arch) = &arch.fat_arch {
                        writeln!(out, "architecture {}", index)?;
                        write_fields(
                            out,
                            2,
                            &[
                                ("cputype", fat_arch.cputype.to_string()),
                                ("cpusubtype", (fat_arch.cpusubtype & 0x00ffffff).to_string()),
                                ("offset", fat_arch.offset.to_string()),
                                ("size", fat_arch.size.to_string()),
                                (
                                    "align",
                                    format!("2^{} ({})", fat_arch.align, 1u64 << fat_arch.align.min(63)),
                                ),
                            ],
                        )?;
                    }
                }
                for (index, arch) in image.archs.iter().enumerate() {
                    writeln!(out, "Mach header for Arch {}", index)?;
                    header_table(&arch.header, out)?;
                }
            }
            header => header_table(header, out)?,
        }
        Ok(())
    }

    fn load_commands<W: Write>(&self, arch: &Arch, out: &mut W) -> io::Result<()> {
        for (index, lc) in arch.load_commands.iter().enumerate() {
            writeln!(out, "Load command {}", index)?;
            load_command(lc, out)?;
        }
        Ok(())
    }
}

/// Byte order and word size of an architecture, plus its CPU when known.
fn describe_arch(arch: &Arch) -> String {
    let on_disk = u32::from_be_bytes(arch.magic.to_ne_bytes());
    let big_endian = matches!(on_disk, MH_MAGIC | MH_MAGIC_64);
    let order = if big_endian {
        "Big Endian"
    } else {
        "Little Endian"
    };
    let sixty_four = matches!(arch.magic, MH_MAGIC_64 | MH_CIGAM_64);

    let mut description = order.to_string();
    if sixty_four {
        description.push_str(", 64");
    }
    if let Some(cpu) = arch.cpu_type_name() {
        description.push_str(", ");
        description.push_str(cpu);
    }
    description
}

fn header_table<W: Write>(header: &Header, out: &mut W) -> io::Result<()> {
    let (cputype, cpusubtype, filetype, flags) = match header {
        Header::Mach(h) => (h.cputype, h.cpusubtype, h.filetype, h.flags),
        Header::Mach64(h) => (h.cputype, h.cpusubtype, h.filetype, h.flags),
        Header::Fat(_) => return Ok(()),
    };
    let Some((ncmds, sizeofcmds)) = header.commands() else {
        return Ok(());
    };
    let caps = (cpusubtype as u32 & 0xff000000) >> 24;

    writeln!(
        out,
        "{:>10} {:>8} {:>10} {:>5} {:>11} {:>5} {:>10} {:>10}",
        "magic", "cputype", "cpusubtype", "caps", "filetype", "ncmds", "sizeofcmds", "flags"
    )?;
    writeln!(
        out,
        "{:>10} {:>8} {:>10} {:>5} {:>11} {:>5} {:>10} {:>10}",
        format!("{:#x}", header.magic()),
        cputype,
        cpusubtype & 0x00ffffff,
        format!("{:#04x}", caps),
        filetype,
        ncmds,
        sizeofcmds,
        format!("{:#010x}", flags)
    )
}

/// Writes `key value` lines with the keys right-aligned to the longest one.
fn write_fields<W: Write>(out: &mut W, indent: usize, fields: &[(&str, String)]) -> io::Result<()> {
    let width = fields.iter().map(|(key, _)| key.len()).max().unwrap_or(0) + indent;
    for (key, value) in fields {
        writeln!(out, "{:>width$} {}", key, value, width = width)?;
    }
    Ok(())
}

fn hex<T: std::fmt::LowerHex>(value: T) -> String {
    format!("{:#x}", value)
}

/// Formats a version packed as `xxxx.yy.zz`.
fn version(packed: u32) -> String {
    let (x, y, z) = (packed >> 16, (packed >> 8) & 0xff, packed & 0xff);
    if z == 0 {
        format!("{}.{}", x, y)
    } else {
        format!("{}.{}.{}", x, y, z)
    }
}

/// Formats a source version packed as `a24.b10.c10.d10.e10`.
fn source_version(packed: u64) -> String {
    format!(
        "{}.{}.{}.{}.{}",
        packed >> 40,
        (packed >> 30) & 0x3ff,
        (packed >> 20) & 0x3ff,
        (packed >> 10) & 0x3ff,
        packed & 0x3ff
    )
}

fn load_command<W: Write>(lc: &LoadCommand, out: &mut W) -> io::Result<()> {
    let swapped = lc.swapped;
    let mut fields = vec![("cmd", lc.name().to_string()), ("cmdsize", lc.cmdsize().to_string())];

    match &lc.command {
        Command::Segment { segment, sections } => {
            fields.extend([
                ("segname", segment.name(swapped)),
                ("vmaddr", hex(segment.vmaddr)),
                ("vmsize", hex(segment.vmsize)),
                ("fileoff", segment.fileoff.to_string()),
                ("filesize", segment.filesize.to_string()),
                ("maxprot", hex(segment.maxprot)),
                ("initprot", hex(segment.initprot)),
                ("nsects", segment.nsects.to_string()),
                ("flags", hex(segment.flags)),
            ]);
            write_fields(out, 0, &fields)?;
            for section in sections {
                section_block(
                    out,
                    section.name(swapped),
                    section.segment_name(swapped),
                    section.addr.into(),
                    section.size.into(),
                    [
                        section.offset,
                        section.align,
                        section.reloff,
                        section.nreloc,
                        section.flags,
                        section.reserved1,
                        section.reserved2,
                    ],
                )?;
            }
            return Ok(());
        }
        Command::Segment64 { segment, sections } => {
            fields.extend([
                ("segname", segment.name(swapped)),
                ("vmaddr", hex(segment.vmaddr)),
                ("vmsize", hex(segment.vmsize)),
                ("fileoff", segment.fileoff.to_string()),
                ("filesize", segment.filesize.to_string()),
                ("maxprot", hex(segment.maxprot)),
                ("initprot", hex(segment.initprot)),
                ("nsects", segment.nsects.to_string()),
                ("flags", hex(segment.flags)),
            ]);
            write_fields(out, 0, &fields)?;
            for section in sections {
                section_block(
                    out,
                    section.name(swapped),
                    section.segment_name(swapped),
                    section.addr,
                    section.size,
                    [
                        section.offset,
                        section.align,
                        section.reloff,
                        section.nreloc,
                        section.flags,
                        section.reserved1,
                        section.reserved2,
                    ],
                )?;
            }
            return Ok(());
        }
        Command::Uuid(c) => fields.push(("uuid", c.uuid_string(swapped))),
        Command::DyldInfoOnly(c) => fields.extend([
            ("rebase_off", c.rebase_off.to_string()),
            ("rebase_size", c.rebase_size.to_string()),
            ("bind_off", c.bind_off.to_string()),
            ("bind_size", c.bind_size.to_string()),
            ("weak_bind_off", c.weak_bind_off.to_string()),
            ("weak_bind_size", c.weak_bind_size.to_string()),
            ("lazy_bind_off", c.lazy_bind_off.to_string()),
            ("lazy_bind_size", c.lazy_bind_size.to_string()),
            ("export_off", c.export_off.to_string()),
            ("export_size", c.export_size.to_string()),
        ]),
        Command::Symtab(c) => fields.extend([
            ("symoff", c.symoff.to_string()),
            ("nsyms", c.nsyms.to_string()),
            ("stroff", c.stroff.to_string()),
            ("strsize", c.strsize.to_string()),
        ]),
        Command::Dysymtab(c) => fields.extend([
            ("ilocalsym", c.ilocalsym.to_string()),
            ("nlocalsym", c.nlocalsym.to_string()),
            ("iextdefsym", c.iextdefsym.to_string()),
            ("nextdefsym", c.nextdefsym.to_string()),
            ("iundefsym", c.iundefsym.to_string()),
            ("nundefsym", c.nundefsym.to_string()),
            ("tocoff", c.tocoff.to_string()),
            ("ntoc", c.ntoc.to_string()),
            ("modtaboff", c.modtaboff.to_string()),
            ("nmodtab", c.nmodtab.to_string()),
            ("extrefsymoff", c.extrefsymoff.to_string()),
            ("nextrefsyms", c.nextrefsyms.to_string()),
            ("indirectsymoff", c.indirectsymoff.to_string()),
            ("nindirectsyms", c.nindirectsyms.to_string()),
            ("extreloff", c.extreloff.to_string()),
            ("nextrel", c.nextrel.to_string()),
            ("locreloff", c.locreloff.to_string()),
            ("nlocrel", c.nlocrel.to_string()),
        ]),
        Command::LoadDylinker { command, name } => {
            fields.push(("name", format!("{} (offset {})", name, command.name)))
        }
        Command::VersionMinMacosx(c) => {
            fields.extend([("version", version(c.version)), ("sdk", version(c.sdk))])
        }
        Command::SourceVersion(c) => fields.push(("version", source_version(c.version))),
        Command::Main(c) => fields.extend([
            ("entryoff", c.entryoff.to_string()),
            ("stacksize", c.stacksize.to_string()),
        ]),
        Command::LoadDylib { command, name } | Command::LoadWeakDylib { command, name } => {
            fields.extend([
                ("name", format!("{} (offset {})", name, command.name)),
                ("time stamp", command.timestamp.to_string()),
                ("current version", version(command.current_version)),
                ("compatibility version", version(command.compatibility_version)),
            ])
        }
        Command::FunctionStarts(c) | Command::DataInCode(c) | Command::CodeSignature(c) => {
            fields.extend([
                ("dataoff", c.dataoff.to_string()),
                ("datasize", c.datasize.to_string()),
            ])
        }
        Command::UnixThread(_) => {}
        Command::BuildVersion(c) => fields.extend([
            ("platform", c.platform.to_string()),
            ("minos", version(c.minos)),
            ("sdk", version(c.sdk)),
            ("ntools", c.ntools.to_string()),
        ]),
        Command::Unknown { data, .. } => {
            fields[0].1 = format!("{} ({:#x})", lc.name(), lc.cmd());
            fields.push(("data", format!("{:#x} bytes", data.len())));
        }
    }

    write_fields(out, 0, &fields)
}

fn section_block<W: Write>(
    out: &mut W,
    sectname: String,
    segname: String,
    addr: u64,
    size: u64,
    [offset, align, reloff, nreloc, flags, reserved1, reserved2]: [u32; 7],
) -> io::Result<()> {
    writeln!(out, "Section")?;
    write_fields(
        out,
        2,
        &[
            ("sectname", sectname),
            ("segname", segname),
            ("addr", hex(addr)),
            ("size", hex(size)),
            ("offset", offset.to_string()),
            ("align", format!("2^{} ({})", align, 1u64 << align.min(63))),
            ("reloff", reloff.to_string()),
            ("nreloc", nreloc.to_string()),
            ("flags", format!("{:#010x}", flags)),
            ("reserved1", format!("{} (index into indirect symbol table)", reserved1)),
            ("reserved2", reserved2.to_string()),
        ],
    )
}
