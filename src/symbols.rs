//! Symbol resolution against the loaded firmware image.
//!
//! RTOS detection and the task walker both key off a handful of kernel
//! globals. This module resolves their names to addresses from the ELF
//! symbol table of the image the operator loaded; it never touches target
//! memory.

use anyhow::{Context, Result};
use object::{Object, ObjectSymbol};
use std::path::Path;

/// ELF symbol table wrapper resolving global variable names to addresses.
pub struct SymbolTable {
    elf_data: Vec<u8>,
}

impl SymbolTable {
    /// Load the symbol table from an ELF file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read ELF image {}", path.display()))?;
        object::File::parse(&*data)
            .with_context(|| format!("Failed to parse ELF image {}", path.display()))?;
        log::info!("Loaded symbols from {}", path.display());
        Ok(Self { elf_data: data })
    }

    /// Wrap an already loaded ELF image.
    pub fn from_elf_data(elf_data: Vec<u8>) -> Result<Self> {
        object::File::parse(&*elf_data).context("Failed to parse ELF image")?;
        Ok(Self { elf_data })
    }

    /// Lookup a symbol address by name, or `None` if the image does not
    /// define it.
    pub fn lookup_symbol(&self, name: &str) -> Option<u64> {
        let obj = object::File::parse(&*self.elf_data).ok()?;
        for symbol in obj.symbols() {
            if let Ok(sym_name) = symbol.name() {
                if sym_name == name {
                    return Some(symbol.address());
                }
            }
        }
        None
    }
}

/// Ordered resolution result for an RTOS's required symbol list.
///
/// Index positions mirror the symbol name list the RTOS support declared;
/// element 0 is the ready-to-run marker the walker uses to pick the current
/// thread. An address of 0 means the symbol did not resolve, which is a
/// normal outcome for images not running that RTOS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSymbols {
    addrs: Vec<u64>,
}

impl ResolvedSymbols {
    /// Resolve `names` in order against the loaded symbol table.
    pub fn resolve(table: &SymbolTable, names: &[&str]) -> Self {
        Self {
            addrs: names
                .iter()
                .map(|name| table.lookup_symbol(name).unwrap_or(0))
                .collect(),
        }
    }

    /// Build directly from resolved addresses, in declaration order.
    ///
    /// For callers with their own resolver, and for tests.
    pub fn from_addresses(addrs: &[u64]) -> Self {
        Self {
            addrs: addrs.to_vec(),
        }
    }

    /// Address of the symbol at `index` in the declared list, 0 if
    /// unresolved or out of range.
    pub fn address(&self, index: usize) -> u64 {
        self.addrs.get(index).copied().unwrap_or(0)
    }

    /// True when every declared symbol resolved to a non-null address.
    pub fn all_present(&self) -> bool {
        !self.addrs.is_empty() && self.addrs.iter().all(|&addr| addr != 0)
    }
}
