//! Symbol lookup from the module files on disk
//!
//! The loaded module list comes from the target's region list. A qualified
//! name `libc.so.6::__curbrk` is resolved by reading the module's own symbol
//! tables and adding the load bias seen in the target.

use super::elf::ElfImage;

use anyhow::{Context, Result};
use heapscope::{MemoryRegion, Module, ModuleLister, SymbolResolver};
use memmap2::Mmap;
use std::fs::File;
use std::path::PathBuf;

/// A module and where its first mapping starts in the target
#[derive(Debug, Clone)]
struct LoadedModule {
    module: Module,
    base: u64,
}

pub struct ElfSymbols {
    modules: Vec<LoadedModule>,
    /// Prefix for module paths, e.g. `/proc/<pid>/root` or an extracted sysroot
    sysroot: Option<PathBuf>,
}

impl ElfSymbols {
    /// Build the module list from file-backed regions
    pub fn from_regions(regions: &[MemoryRegion], sysroot: Option<PathBuf>) -> Self {
        let mut modules: Vec<LoadedModule> = Vec::new();

        for region in regions {
            let Some(path) = region.path.as_deref() else {
                continue;
            };
            if !path.starts_with('/') {
                continue;
            }
            match modules.iter_mut().find(|m| m.module.path == path) {
                Some(existing) => {
                    if region.offset == 0 && region.start < existing.base {
                        existing.base = region.start;
                    }
                }
                None => modules.push(LoadedModule {
                    module: Module::from_path(path),
                    base: region.start,
                }),
            }
        }

        tracing::debug!("Found {} loaded modules", modules.len());
        ElfSymbols { modules, sysroot }
    }

    fn file_path(&self, module: &Module) -> PathBuf {
        match &self.sysroot {
            Some(root) => root.join(module.path.trim_start_matches('/')),
            None => PathBuf::from(&module.path),
        }
    }

    fn lookup(&self, loaded: &LoadedModule, symbol: &str) -> Result<Option<u64>> {
        let path = self.file_path(&loaded.module);
        let file =
            File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        // SAFETY: read-only mapping of a file we do not modify
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to mmap {}", path.display()))?;
        let elf =
            ElfImage::parse(&mmap).with_context(|| format!("Bad ELF file {}", path.display()))?;

        let Some(value) = elf.find_symbol(symbol) else {
            return Ok(None);
        };
        let link_base = elf.first_load_address().unwrap_or(0);
        let bias = loaded.base.wrapping_sub(link_base);

        Ok(Some(value.wrapping_add(bias)))
    }
}

impl ModuleLister for ElfSymbols {
    fn loaded_modules(&self) -> Vec<Module> {
        self.modules.iter().map(|m| m.module.clone()).collect()
    }
}

impl SymbolResolver for ElfSymbols {
    fn find(&self, qualified_name: &str) -> Option<u64> {
        let (module_name, symbol) = qualified_name.rsplit_once("::")?;
        let loaded = self
            .modules
            .iter()
            .find(|m| m.module.name == module_name)?;

        match self.lookup(loaded, symbol) {
            Ok(Some(address)) => {
                tracing::debug!("{} at {:#x}", qualified_name, address);
                Some(address)
            }
            Ok(None) => {
                tracing::debug!("{} not in symbol tables", qualified_name);
                None
            }
            Err(e) => {
                tracing::debug!("Failed to resolve {}: {:#}", qualified_name, e);
                None
            }
        }
    }
}
