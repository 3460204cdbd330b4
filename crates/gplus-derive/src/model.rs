//! Model derive macro implementation
//!
//! Generates the `gplus::Model` impl plus a `<Name>Fields` companion struct of
//! typed field references.

use crate::attrs::{field_attr, field_ident, named_fields, table_name};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{DeriveInput, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let vis = &input.vis;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let fields_struct = format_ident!("{}Fields", name);
    let struct_name = name.to_string();

    let table = match table_name(&input)? {
        Some(table) => quote! { ::core::option::Option::Some(#table) },
        None => quote! { ::core::option::Option::None },
    };

    let mut field_decls = Vec::new();
    let mut field_refs = Vec::new();
    let mut field_metas = Vec::new();
    let mut field_values = Vec::new();

    for field in named_fields(&input, "Model")? {
        let ident = field_ident(field)?;
        let attr = field_attr(field)?;
        let field_name = ident.unraw().to_string();
        let primary_key = attr.is_id;
        let column = match &attr.column {
            Some(column) => quote! { ::core::option::Option::Some(#column) },
            None => quote! { ::core::option::Option::None },
        };

        let doc = format!("Reference to `{struct_name}::{field_name}`.");
        field_decls.push(quote! {
            #[doc = #doc]
            pub #ident: ::gplus::FieldRef
        });
        field_refs.push(quote! {
            #ident: ::gplus::FieldRef::of::<Self>(#field_name)
        });
        field_metas.push(quote! {
            ::gplus::FieldMeta {
                name: #field_name,
                column: #column,
                primary_key: #primary_key,
            }
        });
        field_values.push(quote! {
            ::gplus::Value::from(::core::clone::Clone::clone(&self.#ident))
        });
    }

    let fields_doc = format!("Typed column references for [`{struct_name}`].");

    Ok(quote! {
        #[doc = #fields_doc]
        #[derive(Debug, Clone, Copy)]
        #vis struct #fields_struct {
            #(#field_decls,)*
        }

        impl #impl_generics ::gplus::Model for #name #ty_generics #where_clause {
            type Fields = #fields_struct;

            fn fields() -> Self::Fields {
                #fields_struct {
                    #(#field_refs,)*
                }
            }

            fn describe() -> ::gplus::ModelMeta {
                ::gplus::ModelMeta {
                    name: #struct_name,
                    table: #table,
                    fields: ::std::vec![#(#field_metas),*],
                }
            }

            fn values(&self) -> ::std::vec::Vec<::gplus::Value> {
                ::std::vec![#(#field_values),*]
            }
        }
    })
}
