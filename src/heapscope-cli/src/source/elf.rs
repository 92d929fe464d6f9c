//! ELF access through the `object` crate
//!
//! Core dumps need their PT_LOAD segments and the NT_AUXV note; shared
//! objects need `.dynsym`/`.symtab` lookups and their link-time base.

use anyhow::{bail, ensure, Context, Result};
use byteorder::{ByteOrder, LE};
use object::elf::{FileHeader32, FileHeader64, NT_AUXV};
use object::read::elf::{FileHeader, ProgramHeader};
use object::{
    BinaryFormat, Endianness, FileKind, Object, ObjectKind, ObjectSegment, ObjectSymbol,
    SegmentFlags,
};

pub use object::elf::{PF_R, PF_W, PF_X};

pub const AT_NULL: u64 = 0;
pub const AT_PAGESZ: u64 = 6;

/// Pointer width of an ELF image, from its first 16 bytes
pub fn pointer_width(ident: &[u8]) -> Result<usize> {
    match FileKind::parse(ident).context("Unrecognized file header")? {
        FileKind::Elf32 => Ok(4),
        FileKind::Elf64 => Ok(8),
        other => bail!("Not an ELF image ({:?})", other),
    }
}

/// A PT_LOAD program header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSegment {
    pub vaddr: u64,
    pub memsz: u64,
    pub offset: u64,
    pub filesz: u64,
    pub align: u64,
    pub flags: u32,
}

/// A parsed little-endian ELF file
pub struct ElfImage<'data> {
    data: &'data [u8],
    file: object::File<'data>,
}

impl<'data> ElfImage<'data> {
    pub fn parse(data: &'data [u8]) -> Result<Self> {
        let file = object::File::parse(data).context("Failed to parse object file")?;
        ensure!(file.format() == BinaryFormat::Elf, "Not an ELF file");
        ensure!(
            file.is_little_endian(),
            "Big-endian ELF files are not supported"
        );
        Ok(ElfImage { data, file })
    }

    pub fn pointer_width(&self) -> usize {
        if self.file.is_64() {
            8
        } else {
            4
        }
    }

    pub fn is_core(&self) -> bool {
        self.file.kind() == ObjectKind::Core
    }

    /// PT_LOAD headers as stored; offsets are not checked against the file
    pub fn load_segments(&self) -> Vec<LoadSegment> {
        self.file
            .segments()
            .map(|segment| {
                let (offset, filesz) = segment.file_range();
                let flags = match segment.flags() {
                    SegmentFlags::Elf { p_flags } => p_flags,
                    _ => 0,
                };
                LoadSegment {
                    vaddr: segment.address(),
                    memsz: segment.size(),
                    offset,
                    filesz,
                    align: segment.align(),
                    flags,
                }
            })
            .collect()
    }

    /// Page-aligned virtual address of the first loadable segment
    pub fn first_load_address(&self) -> Option<u64> {
        self.load_segments()
            .into_iter()
            .map(|segment| {
                let align = segment.align.max(1);
                if align.is_power_of_two() {
                    segment.vaddr & !(align - 1)
                } else {
                    segment.vaddr
                }
            })
            .min()
    }

    /// Value of an auxiliary vector entry stored in an NT_AUXV note
    pub fn auxv_value(&self, key: u64) -> Result<Option<u64>> {
        let auxv = if self.file.is_64() {
            auxv_note::<FileHeader64<Endianness>>(self.data)?
        } else {
            auxv_note::<FileHeader32<Endianness>>(self.data)?
        };
        Ok(auxv.and_then(|desc| find_auxv_value(desc, self.pointer_width(), key)))
    }

    /// Value of a defined symbol, searching `.dynsym` before `.symtab`
    pub fn find_symbol(&self, name: &str) -> Option<u64> {
        self.file
            .dynamic_symbols()
            .chain(self.file.symbols())
            .find(|symbol| !symbol.is_undefined() && symbol.name().is_ok_and(|n| n == name))
            .map(|symbol| symbol.address())
    }
}

fn auxv_note<Elf: FileHeader<Endian = Endianness>>(data: &[u8]) -> Result<Option<&[u8]>> {
    let header = Elf::parse(data)?;
    let endian = header.endian()?;
    for program_header in header.program_headers(endian, data)? {
        let Some(mut notes) = program_header.notes(endian, data)? else {
            continue;
        };
        while let Some(note) = notes.next()? {
            if note.n_type(endian) == NT_AUXV {
                return Ok(Some(note.desc()));
            }
        }
    }
    Ok(None)
}

/// Scan a raw auxiliary vector (pairs of target words) for `key`
pub fn find_auxv_value(auxv: &[u8], pointer_width: usize, key: u64) -> Option<u64> {
    let read_word = |bytes: &[u8]| match pointer_width {
        4 => LE::read_u32(bytes) as u64,
        _ => LE::read_u64(bytes),
    };

    for pair in auxv.chunks_exact(pointer_width * 2) {
        let a_type = read_word(&pair[..pointer_width]);
        let a_val = read_word(&pair[pointer_width..]);
        if a_type == AT_NULL {
            break;
        }
        if a_type == key {
            return Some(a_val);
        }
    }
    None
}

/// Builders for synthetic ELF images used across the source tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use byteorder::WriteBytesExt;
    use object::elf::{
        ELFCLASS64, ELFDATA2LSB, ELFMAG, EM_X86_64, ET_CORE, ET_DYN, PT_LOAD, PT_NOTE,
        SHT_DYNSYM, SHT_NULL, SHT_STRTAB,
    };

    struct Phdr {
        p_type: u32,
        flags: u32,
        offset: u64,
        vaddr: u64,
        filesz: u64,
        memsz: u64,
        align: u64,
    }

    fn header64(e_type: u16, phoff: u64, phnum: u16, shoff: u64, shnum: u16) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&ELFMAG);
        out.extend_from_slice(&[ELFCLASS64, ELFDATA2LSB, 1]);
        out.resize(16, 0);
        out.write_u16::<LE>(e_type).unwrap();
        out.write_u16::<LE>(EM_X86_64).unwrap();
        out.write_u32::<LE>(1).unwrap();
        out.write_u64::<LE>(0).unwrap(); // e_entry
        out.write_u64::<LE>(phoff).unwrap();
        out.write_u64::<LE>(shoff).unwrap();
        out.write_u32::<LE>(0).unwrap(); // e_flags
        out.write_u16::<LE>(64).unwrap();
        out.write_u16::<LE>(56).unwrap();
        out.write_u16::<LE>(phnum).unwrap();
        out.write_u16::<LE>(64).unwrap();
        out.write_u16::<LE>(shnum).unwrap();
        out.write_u16::<LE>(0).unwrap(); // e_shstrndx
        out
    }

    fn program_header64(out: &mut Vec<u8>, ph: &Phdr) {
        out.write_u32::<LE>(ph.p_type).unwrap();
        out.write_u32::<LE>(ph.flags).unwrap();
        out.write_u64::<LE>(ph.offset).unwrap();
        out.write_u64::<LE>(ph.vaddr).unwrap();
        out.write_u64::<LE>(ph.vaddr).unwrap(); // p_paddr
        out.write_u64::<LE>(ph.filesz).unwrap();
        out.write_u64::<LE>(ph.memsz).unwrap();
        out.write_u64::<LE>(ph.align).unwrap();
    }

    fn section_header64(
        out: &mut Vec<u8>,
        sh_type: u32,
        offset: u64,
        size: u64,
        link: u32,
        entsize: u64,
    ) {
        out.write_u32::<LE>(0).unwrap(); // sh_name
        out.write_u32::<LE>(sh_type).unwrap();
        out.write_u64::<LE>(0).unwrap(); // sh_flags
        out.write_u64::<LE>(0).unwrap(); // sh_addr
        out.write_u64::<LE>(offset).unwrap();
        out.write_u64::<LE>(size).unwrap();
        out.write_u32::<LE>(link).unwrap();
        out.write_u32::<LE>(0).unwrap(); // sh_info
        out.write_u64::<LE>(8).unwrap(); // sh_addralign
        out.write_u64::<LE>(entsize).unwrap();
    }

    /// A shared object with one PT_LOAD at `load_vaddr` and a `.dynsym`
    /// defining `symbols`
    pub fn shared_object(load_vaddr: u64, symbols: &[(&str, u64)]) -> Vec<u8> {
        let mut strings = vec![0u8];
        let mut entries = vec![0u8; 24]; // null symbol
        for (name, value) in symbols {
            let name_offset = strings.len() as u32;
            strings.extend_from_slice(name.as_bytes());
            strings.push(0);

            entries.write_u32::<LE>(name_offset).unwrap();
            entries.push(0x11); // STB_GLOBAL | STT_OBJECT
            entries.push(0);
            entries.write_u16::<LE>(1).unwrap(); // st_shndx: defined
            entries.write_u64::<LE>(*value).unwrap();
            entries.write_u64::<LE>(8).unwrap();
        }
        // an undefined import with the same name must never win
        let undefined_name = strings.len() as u32;
        strings.extend_from_slice(b"undefined_import\0");
        entries.write_u32::<LE>(undefined_name).unwrap();
        entries.extend_from_slice(&[0x10, 0, 0, 0]);
        entries.write_u64::<LE>(0x1234).unwrap();
        entries.write_u64::<LE>(0).unwrap();

        let phoff = 64u64;
        let strtab_offset = phoff + 56;
        let symtab_offset = strtab_offset + strings.len() as u64;
        let shoff = symtab_offset + entries.len() as u64;

        let mut out = header64(ET_DYN, phoff, 1, shoff, 3);
        program_header64(
            &mut out,
            &Phdr {
                p_type: PT_LOAD,
                flags: PF_R | PF_X,
                offset: 0,
                vaddr: load_vaddr,
                filesz: 0,
                memsz: 0x1000,
                align: 0x1000,
            },
        );
        out.extend_from_slice(&strings);
        out.extend_from_slice(&entries);

        section_header64(&mut out, SHT_NULL, 0, 0, 0, 0);
        section_header64(&mut out, SHT_DYNSYM, symtab_offset, entries.len() as u64, 2, 24);
        section_header64(&mut out, SHT_STRTAB, strtab_offset, strings.len() as u64, 0, 0);
        out
    }

    /// An ELF64 core file with one PT_LOAD per `(vaddr, bytes, flags)` and
    /// an NT_AUXV note carrying `page_size`
    pub fn core_file(segments: &[(u64, Vec<u8>, u32)], page_size: u64) -> Vec<u8> {
        let mut auxv = Vec::new();
        for (key, value) in [(AT_PAGESZ, page_size), (AT_NULL, 0)] {
            auxv.write_u64::<LE>(key).unwrap();
            auxv.write_u64::<LE>(value).unwrap();
        }
        let mut note = Vec::new();
        note.write_u32::<LE>(5).unwrap();
        note.write_u32::<LE>(auxv.len() as u32).unwrap();
        note.write_u32::<LE>(NT_AUXV).unwrap();
        note.extend_from_slice(b"CORE\0\0\0\0");
        note.extend_from_slice(&auxv);

        let phnum = segments.len() + 1;
        let phoff = 64u64;
        let mut data_offset = phoff + 56 * phnum as u64;

        let mut headers = vec![Phdr {
            p_type: PT_NOTE,
            flags: 0,
            offset: data_offset,
            vaddr: 0,
            filesz: note.len() as u64,
            memsz: 0,
            align: 4,
        }];
        data_offset += note.len() as u64;
        for (vaddr, bytes, flags) in segments {
            headers.push(Phdr {
                p_type: PT_LOAD,
                flags: *flags,
                offset: data_offset,
                vaddr: *vaddr,
                filesz: bytes.len() as u64,
                memsz: bytes.len() as u64,
                align: 0x1000,
            });
            data_offset += bytes.len() as u64;
        }

        let mut out = header64(ET_CORE, phoff, phnum as u16, 0, 0);
        for header in &headers {
            program_header64(&mut out, header);
        }
        out.extend_from_slice(&note);
        for (_, bytes, _) in segments {
            out.extend_from_slice(bytes);
        }
        out
    }
}
