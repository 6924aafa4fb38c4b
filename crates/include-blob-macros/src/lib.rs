//! Proc-macro backing [`include-blob`](https://docs.rs/include-blob).

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, LitStr};

/// Embeds the contents of a file, resolved relative to `CARGO_MANIFEST_DIR`, as a `&'static
/// [u8]`.
///
/// This expands to a plain `include_bytes!`, so model weights still end up in the final binary's
/// read-only data section; callers needing the zero-compile-time linker-section trick described
/// by the crate's own `object`/`ar`-based `package_archive` should use that instead and reference
/// the resulting archive from `build.rs`.
#[proc_macro]
pub fn include_bytes(input: TokenStream) -> TokenStream {
    let path = parse_macro_input!(input as LitStr);
    let value = path.value();

    let expanded = quote! {
        ::core::include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/", #value))
    };
    expanded.into()
}
