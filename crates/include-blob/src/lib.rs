//! Embeds large binary blobs (neural network weights, in this workspace) into the final binary.
//!
//! [`include_bytes!`] is a drop-in, dependency-free replacement for `core::include_bytes!` that
//! call sites use directly. [`package_archive`] additionally exposes the linker-section
//! packaging this crate is named for, for `build.rs` scripts that want to avoid paying rustc's
//! per-byte compile-time cost on very large blobs; nothing in this workspace currently needs it,
//! since our model weights are small enough that plain `include_bytes!` is fine.

pub use include_blob_macros::include_bytes;

use std::path::Path;

use object::write::{Object, StandardSection, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};

/// Packages `data` into a single-member `ar` archive containing one relocatable object file that
/// exports `symbol_name` pointing at the raw bytes, suitable for linking via
/// `cargo:rustc-link-arg=<path>` from a `build.rs`.
pub fn package_archive(symbol_name: &str, data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);

    let (section, offset) = {
        let section_id = obj.section_id(StandardSection::ReadOnlyData);
        let offset = obj.append_section_data(section_id, data, 16);
        (section_id, offset)
    };

    obj.add_symbol(Symbol {
        name: symbol_name.as_bytes().to_vec(),
        value: offset,
        size: data.len() as u64,
        kind: SymbolKind::Data,
        scope: SymbolScope::Dynamic,
        weak: false,
        section: SymbolSection::Section(section),
        flags: SymbolFlags::None,
    });

    let object_bytes = obj.write()?;

    let mut archive_bytes = Vec::new();
    let mut builder = ar::Builder::new(&mut archive_bytes);
    let header = ar::Header::new(b"blob.o".to_vec(), object_bytes.len() as u64);
    builder.append(&header, object_bytes.as_slice())?;
    drop(builder);

    Ok(archive_bytes)
}

/// Writes an archive produced by [`package_archive`] to `out_path` and emits the `cargo:`
/// directives needed to link it, for use from `build.rs`.
pub fn emit_archive(out_path: &Path, symbol_name: &str, data: &[u8]) -> anyhow::Result<()> {
    let archive = package_archive(symbol_name, data)?;
    std::fs::write(out_path, archive)?;
    println!("cargo:rustc-link-arg={}", out_path.display());
    Ok(())
}
