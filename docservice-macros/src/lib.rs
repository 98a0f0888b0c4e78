//! Procedural macros for the docservice project.
//!
//! ### `DocumentModel`
//!
//! Implements `DocumentModel` for a struct whose identifier is declared as
//! `#[serde(rename = "_id")] id: StrObjectId`.
//!
//! ```ignore
//! #[derive(Debug, Serialize, Deserialize, DocumentModel)]
//! pub struct User {
//!     #[serde(rename = "_id")]
//!     pub id: StrObjectId,
//!     pub name: String,
//! }
//! ```
//!
//! ### `UpdateModel`
//!
//! Implements `UpdateModel` for a struct of optional fields. Every field must be typed
//! `Option<T>` or `Patch<T>`, or be marked `#[serde(skip)]`, and is written only when set.
//! Fields are looked up under their serialized name, including `rename(serialize = ..)`.
//!
//! ```ignore
//! #[derive(Debug, Default, Serialize, UpdateModel)]
//! pub struct UserUpdate {
//!     pub name: Patch<String>,
//!     // `Patch::Set(None)` writes null, `Patch::Unset` leaves the stored value alone.
//!     pub nickname: Patch<Option<String>>,
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docservice_macros;

mod attrs;
mod document_model;
mod update_model;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `DocumentModel`.
///
/// # Errors
///
/// Fails to compile if the type is not a struct with named fields, has no `id` field, or
/// the `id` field is not renamed to `_id`.
#[proc_macro_derive(DocumentModel)]
pub fn derive_document_model(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    document_model::expand(&ast)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derives `UpdateModel`.
///
/// # Errors
///
/// Fails to compile if the type is not a struct with named fields, has a field that does
/// not track whether it was set, or uses serde attributes that change field names in bulk
/// (`rename_all`) or flatten fields.
#[proc_macro_derive(UpdateModel)]
pub fn derive_update_model(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    update_model::expand(&ast)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
