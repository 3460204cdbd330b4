//! Attribute parsing shared by the `Model` and `FromRow` derives.
//!
//! Struct level: `#[orm(table = "users")]`.
//! Field level: `#[orm(id)]`, `#[orm(primary_key)]`, `#[orm(column = "user_name")]`.

use heck::ToSnakeCase;
use syn::ext::IdentExt;
use syn::{DeriveInput, Result};

/// Parsed field-level `#[orm(...)]` contents.
#[derive(Default)]
pub(crate) struct FieldAttr {
    pub is_id: bool,
    pub column: Option<String>,
}

impl syn::parse::Parse for FieldAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        while !input.is_empty() {
            let ident: syn::Ident = input.parse()?;
            if ident == "id" || ident == "primary_key" {
                attr.is_id = true;
            } else if ident == "column" {
                let _: syn::Token![=] = input.parse()?;
                let value: syn::LitStr = input.parse()?;
                attr.column = Some(value.value());
            } else {
                return Err(syn::Error::new_spanned(
                    &ident,
                    "unknown orm attribute, expected `id`, `primary_key` or `column = \"...\"`",
                ));
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attr)
    }
}

/// Merge every `#[orm(...)]` on a field.
pub(crate) fn field_attr(field: &syn::Field) -> Result<FieldAttr> {
    let mut merged = FieldAttr::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        let parsed: FieldAttr = attr.parse_args()?;
        merged.is_id |= parsed.is_id;
        if parsed.column.is_some() {
            merged.column = parsed.column;
        }
    }
    Ok(merged)
}

/// Column a field is read from: the explicit tag, else the snake_case field name.
pub(crate) fn column_name(field: &syn::Field) -> Result<String> {
    let attr = field_attr(field)?;
    Ok(match attr.column {
        Some(column) => column,
        None => field_ident(field)?.unraw().to_string().to_snake_case(),
    })
}

pub(crate) fn field_ident(field: &syn::Field) -> Result<&syn::Ident> {
    field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))
}

/// Extract the optional struct-level `#[orm(table = "...")]`.
pub(crate) fn table_name(input: &DeriveInput) -> Result<Option<String>> {
    for attr in &input.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        let nested = attr.parse_args::<syn::MetaNameValue>()?;
        if !nested.path.is_ident("table") {
            return Err(syn::Error::new_spanned(
                &nested.path,
                "unknown struct attribute, expected `table = \"...\"`",
            ));
        }
        if let syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(lit),
            ..
        }) = &nested.value
        {
            return Ok(Some(lit.value()));
        }
        return Err(syn::Error::new_spanned(
            &nested.value,
            "table name must be a string literal",
        ));
    }
    Ok(None)
}

/// Named fields of a struct, or a spanned error for anything else.
pub(crate) fn named_fields<'a>(
    input: &'a DeriveInput,
    derive: &str,
) -> Result<&'a syn::punctuated::Punctuated<syn::Field, syn::Token![,]>> {
    match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(fields) => Ok(&fields.named),
            _ => Err(syn::Error::new_spanned(
                input,
                format!("{derive} can only be derived for structs with named fields"),
            )),
        },
        _ => Err(syn::Error::new_spanned(
            input,
            format!("{derive} can only be derived for structs"),
        )),
    }
}
