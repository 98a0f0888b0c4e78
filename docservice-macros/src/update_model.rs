use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Result};

use crate::attrs::{named_fields, serde_attrs, tracks_state};

pub(crate) fn expand(ast: &DeriveInput) -> Result<TokenStream> {
    let fields = named_fields(ast, "UpdateModel")?;

    if serde_attrs(&ast.attrs)?.rename_all {
        return Err(syn::Error::new_spanned(
            &ast.ident,
            "UpdateModel does not support #[serde(rename_all)]; rename fields individually",
        ));
    }

    let mut removals = Vec::new();
    for field in fields {
        let attrs = serde_attrs(&field.attrs)?;
        if attrs.flatten {
            return Err(syn::Error::new_spanned(field, "UpdateModel does not support #[serde(flatten)]"));
        }
        if attrs.skip {
            continue;
        }
        if !tracks_state(&field.ty) {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "UpdateModel fields must be `Patch<T>` or `Option<T>` so unset fields are left out; \
                 use `Patch<T>` or mark the field #[serde(skip)]",
            ));
        }

        let Some(ident) = &field.ident else { continue };
        let wire_name = attrs
            .rename
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());

        removals.push(quote! {
            if ::docservice::model::FieldState::is_unset(&self.#ident) {
                document.remove(#wire_name);
            }
        });
    }

    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::docservice::model::UpdateModel for #name #ty_generics #where_clause {
            fn to_set_document(&self) -> ::docservice::error::ServiceResult<::docservice::bson::Document> {
                #[allow(unused_mut)]
                let mut document = ::docservice::model::serialize_document(self)?;
                #(#removals)*
                Ok(document)
            }
        }
    })
}
