//! Reading the serde attributes that decide how a field appears on the wire.

use proc_macro2::TokenStream;
use syn::{Attribute, Data, DeriveInput, Expr, Field, LitStr, Result, Token, Type, punctuated::Punctuated, token};

/// The serde settings of one field or container that matter to the derives.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct SerdeAttrs {
    pub rename: Option<String>,
    pub rename_all: bool,
    pub flatten: bool,
    pub skip: bool,
}

/// Collects the relevant `#[serde(...)]` settings, skipping over everything else.
pub(crate) fn serde_attrs(attrs: &[Attribute]) -> Result<SerdeAttrs> {
    let mut found = SerdeAttrs::default();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("rename") && meta.input.peek(Token![=]) {
                let value: LitStr = meta.value()?.parse()?;
                found.rename = Some(value.value());
                return Ok(());
            }
            if path.is_ident("rename") && meta.input.peek(token::Paren) {
                // Only the serialized name reaches the store.
                return meta.parse_nested_meta(|inner| {
                    let value: LitStr = inner.value()?.parse()?;
                    if inner.path.is_ident("serialize") {
                        found.rename = Some(value.value());
                    }
                    Ok(())
                });
            }
            if path.is_ident("rename_all") || path.is_ident("rename_all_fields") {
                found.rename_all = true;
            }
            if path.is_ident("flatten") {
                found.flatten = true;
            }
            if path.is_ident("skip") || path.is_ident("skip_serializing") {
                found.skip = true;
            }

            if meta.input.peek(Token![=]) {
                meta.value()?.parse::<Expr>()?;
            } else if meta.input.peek(token::Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                content.parse::<TokenStream>()?;
            }
            Ok(())
        })?;
    }

    Ok(found)
}

/// Returns the named fields of a struct.
pub(crate) fn named_fields<'a>(ast: &'a DeriveInput, derive: &str) -> Result<&'a Punctuated<Field, Token![,]>> {
    match &ast.data {
        Data::Struct(data) => match &data.fields {
            syn::Fields::Named(fields) => Ok(&fields.named),
            _ => Err(syn::Error::new_spanned(
                &ast.ident,
                format!("{derive} can only be derived for structs with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            &ast.ident,
            format!("{derive} can only be derived for structs"),
        )),
    }
}

/// Whether a field type tracks its own set/unset state (`Option<T>` or `Patch<T>`).
pub(crate) fn tracks_state(ty: &Type) -> bool {
    match ty {
        Type::Path(path) if path.qself.is_none() => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option" || segment.ident == "Patch"),
        _ => false,
    }
}
