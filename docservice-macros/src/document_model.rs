use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

use crate::attrs::{named_fields, serde_attrs};

pub(crate) fn expand(ast: &DeriveInput) -> Result<TokenStream> {
    let fields = named_fields(ast, "DocumentModel")?;

    let id_field = fields
        .iter()
        .find(|field| field.ident.as_ref().is_some_and(|ident| ident == "id"))
        .ok_or_else(|| syn::Error::new_spanned(&ast.ident, "DocumentModel requires an `id` field"))?;

    if serde_attrs(&id_field.attrs)?.rename.as_deref() != Some("_id") {
        return Err(syn::Error::new_spanned(
            id_field,
            "the `id` field of a DocumentModel must be declared with #[serde(rename = \"_id\")]",
        ));
    }

    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::docservice::model::DocumentModel for #name #ty_generics #where_clause {
            fn id(&self) -> &::docservice::id::StrObjectId {
                &self.id
            }
        }
    })
}
