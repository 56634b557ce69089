//! Symbolizer for one ELF binary
//!
//! Function names and start addresses come from the ELF symbol tables
//! (`.symtab` and `.dynsym`); source file and line come from DWARF line
//! tables when the binary carries them. Addresses passed in are *image*
//! addresses (what the symbol tables record); the caller relocates runtime
//! addresses by the load bias first.

use addr2line::Context;
use anyhow::{Context as _, Result};
use gimli::{EndianRcSlice, RunTimeEndian};
use log::debug;
use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol, SymbolKind};
use rustc_demangle::demangle;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use livetrace_common::Symbol;

/// A function entry from the symbol tables
#[derive(Debug, Clone)]
struct FunctionSymbol {
    address: u64,
    size: u64,
    name: String,
}

/// Resolves image addresses of one binary to function and source location
pub struct Symbolizer {
    /// DWARF context, `None` when the binary has no usable debug info
    ctx: Option<Context<EndianRcSlice<RunTimeEndian>>>,
    /// Function symbols sorted by address
    functions: Vec<FunctionSymbol>,
    /// Lowest virtual address of any loadable segment, page aligned
    image_base: u64,
}

impl Symbolizer {
    /// Create a new symbolizer for the given binary
    ///
    /// # Errors
    /// Returns an error if the binary file cannot be read or parsed
    pub fn new<P: AsRef<Path>>(binary_path: P) -> Result<Self> {
        let binary_data = fs::read(binary_path.as_ref()).context("Failed to read binary file")?;
        let obj_file = object::File::parse(&*binary_data).context("Failed to parse object file")?;

        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let ctx = match gimli::Dwarf::load(&load_section).map(Context::from_dwarf) {
            Ok(Ok(ctx)) => Some(ctx),
            Ok(Err(e)) | Err(e) => {
                debug!("{}: no usable DWARF ({e})", binary_path.as_ref().display());
                None
            }
        };

        let mut functions: Vec<FunctionSymbol> = obj_file
            .symbols()
            .chain(obj_file.dynamic_symbols())
            .filter(|s| s.kind() == SymbolKind::Text && s.address() != 0)
            .filter_map(|s| {
                let name = s.name().ok().filter(|n| !n.is_empty())?;
                Some(FunctionSymbol {
                    address: s.address(),
                    size: s.size(),
                    name: Self::demangle_symbol(name),
                })
            })
            .collect();
        functions.sort_by_key(|f| f.address);
        functions.dedup_by_key(|f| f.address);

        let image_base =
            obj_file.segments().map(|s| s.address()).min().unwrap_or(0) & !(PAGE_SIZE - 1);

        debug!(
            "{}: {} function symbols, image base 0x{image_base:x}, dwarf: {}",
            binary_path.as_ref().display(),
            functions.len(),
            ctx.is_some()
        );

        Ok(Self { ctx, functions, image_base })
    }

    /// Lowest loadable virtual address of the binary
    #[must_use]
    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    /// Resolve an image address
    ///
    /// Returns `None` when no function symbol covers the address and DWARF
    /// knows nothing about it either.
    #[must_use]
    pub fn resolve(&self, addr: u64) -> Option<Symbol> {
        let (source_file, source_line) = self.location(addr).unwrap_or_default();

        if let Some(function) = self.enclosing_function(addr) {
            return Some(Symbol {
                source_file,
                source_line,
                function_name: function.name.clone(),
                function_start_address: function.address,
                displacement: addr - function.address,
            });
        }

        // Stripped symbol tables: fall back to the DWARF subprogram name
        let function_name = self.dwarf_function(addr)?;
        Some(Symbol {
            source_file,
            source_line,
            function_name,
            function_start_address: addr,
            displacement: 0,
        })
    }

    fn enclosing_function(&self, addr: u64) -> Option<&FunctionSymbol> {
        let idx = self.functions.partition_point(|f| f.address <= addr);
        let candidate = self.functions.get(idx.checked_sub(1)?)?;
        // Zero-sized symbols (hand-written assembly) cover up to the next symbol
        let covers = candidate.size == 0 || addr < candidate.address + candidate.size;
        covers.then_some(candidate)
    }

    fn location(&self, addr: u64) -> Option<(String, u64)> {
        let location = self.ctx.as_ref()?.find_location(addr).ok()??;
        Some((location.file?.to_string(), u64::from(location.line.unwrap_or(0))))
    }

    fn dwarf_function(&self, addr: u64) -> Option<String> {
        let mut frames = self.ctx.as_ref()?.find_frames(addr).skip_all_loads().ok()?;
        let mut outermost = None;
        while let Ok(Some(frame)) = frames.next() {
            if let Some(name) = frame.function.and_then(|f| f.demangle().ok().map(|s| s.to_string()))
            {
                outermost = Some(name);
            }
        }
        outermost
    }

    /// Demangle a Rust symbol name
    #[must_use]
    pub fn demangle_symbol(symbol: &str) -> String {
        format!("{:#}", demangle(symbol))
    }
}

const PAGE_SIZE: u64 = 4096;

#[cfg(test)]
mod tests {
    use super::*;

    fn symbolizer_with(functions: Vec<FunctionSymbol>) -> Symbolizer {
        Symbolizer { ctx: None, functions, image_base: 0 }
    }

    #[test]
    fn test_demangle_symbol() {
        let demangled = Symbolizer::demangle_symbol("_ZN4core3ptr13drop_in_place17h0123456789abcdefE");
        assert_eq!(demangled, "core::ptr::drop_in_place");
        assert_eq!(Symbolizer::demangle_symbol("memcpy"), "memcpy");
    }

    #[test]
    fn test_resolve_within_function() {
        let symbolizer = symbolizer_with(vec![
            FunctionSymbol { address: 0x1000, size: 0x100, name: "alpha".into() },
            FunctionSymbol { address: 0x2000, size: 0x40, name: "beta".into() },
        ]);

        let symbol = symbolizer.resolve(0x2010).unwrap();
        assert_eq!(symbol.function_name, "beta");
        assert_eq!(symbol.function_start_address, 0x2000);
        assert_eq!(symbol.displacement, 0x10);
        assert!(symbol.source_file.is_empty());
    }

    #[test]
    fn test_resolve_gap_between_functions() {
        let symbolizer = symbolizer_with(vec![
            FunctionSymbol { address: 0x1000, size: 0x100, name: "alpha".into() },
            FunctionSymbol { address: 0x2000, size: 0x40, name: "beta".into() },
        ]);

        assert!(symbolizer.resolve(0x1800).is_none());
        assert!(symbolizer.resolve(0x0800).is_none());
    }

    #[test]
    fn test_zero_sized_symbol_extends() {
        let symbolizer = symbolizer_with(vec![FunctionSymbol {
            address: 0x3000,
            size: 0,
            name: "_start".into(),
        }]);
        assert_eq!(symbolizer.resolve(0x3020).unwrap().displacement, 0x20);
    }

    #[test]
    fn test_symbolizer_on_own_binary() {
        let exe = std::env::current_exe().unwrap();
        let symbolizer = Symbolizer::new(&exe).expect("Failed to create symbolizer");
        assert!(!symbolizer.functions.is_empty(), "test binary should carry a symbol table");
    }

    #[test]
    fn test_symbolizer_missing_binary() {
        assert!(Symbolizer::new("/nonexistent/binary").is_err());
    }
}
