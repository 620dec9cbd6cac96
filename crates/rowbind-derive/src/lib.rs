//! # rowbind-derive
//!
//! Derive macros for binding structs as rowbind records.
//!
//! `#[derive(Record)]` lets a struct with named fields stand wherever a tuple
//! of columns is accepted: statement parameters, result rows, table rows.
//! Fields are bound in declaration order and may themselves be records, in
//! which case their columns are flattened in place.
//!
//! `#[derive(NamedRecord)]` additionally provides the column names used to
//! generate table statements.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rowbind_derive::{NamedRecord, Record};
//! use rowbind_types::{FixedString, Nullable};
//!
//! #[derive(Debug, Clone, Default, Record, NamedRecord)]
//! struct User {
//!     id: i32,
//!     #[rowbind(rename = "user_name")]
//!     name: FixedString<32>,
//!     age: Nullable<i16>,
//!     #[rowbind(skip)]
//!     dirty: bool,
//! }
//! ```

#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// A bound field: its identifier, type and column name.
struct BoundField {
    ident: syn::Ident,
    ty: syn::Type,
    column: String,
}

/// Collect the non-skipped named fields of a struct.
fn bound_fields(input: &DeriveInput) -> syn::Result<Vec<BoundField>> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "rowbind records need a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "rowbind records can only be derived for structs",
            ));
        }
    };

    let mut bound = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let mut column = ident.to_string();
        let mut skip = false;

        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("rowbind")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let name: LitStr = meta.value()?.parse()?;
                    column = name.value();
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `rename = \"...\"` or `skip`"))
                }
            })?;
        }

        if !skip {
            bound.push(BoundField {
                ident,
                ty: field.ty.clone(),
                column,
            });
        }
    }
    Ok(bound)
}

/// Derive macro for implementing the `Record` trait.
///
/// The struct must also implement `Default` and `Clone`.
///
/// ## Attributes
///
/// - `#[rowbind(skip)]` - Leave the field unbound; it keeps its `Default`
///   value when a row is read
/// - `#[rowbind(rename = "column_name")]` - Accepted for use with
///   `NamedRecord`
#[proc_macro_derive(Record, attributes(rowbind))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_record(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_record(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let fields = bound_fields(input)?;

    let idents: Vec<_> = fields.iter().map(|f| &f.ident).collect();
    let types: Vec<_> = fields.iter().map(|f| &f.ty).collect();

    Ok(quote! {
        impl #impl_generics ::rowbind_types::Record for #name #ty_generics #where_clause {
            const WIDTH: usize = 0 #(+ <#types as ::rowbind_types::Record>::WIDTH)*;

            fn describe(out: &mut ::std::vec::Vec<::rowbind_types::ColumnType>) {
                #(<#types as ::rowbind_types::Record>::describe(out);)*
            }

            fn write(&self, out: &mut [::rowbind_types::Cell]) {
                let mut offset = 0usize;
                #(
                    let width = <#types as ::rowbind_types::Record>::WIDTH;
                    ::rowbind_types::Record::write(&self.#idents, &mut out[offset..offset + width]);
                    offset += width;
                )*
                let _ = (out, offset);
            }

            fn read(
                &mut self,
                cells: &[::rowbind_types::Cell],
            ) -> ::std::result::Result<(), ::rowbind_types::TypeError> {
                let mut offset = 0usize;
                #(
                    let width = <#types as ::rowbind_types::Record>::WIDTH;
                    ::rowbind_types::Record::read(&mut self.#idents, &cells[offset..offset + width])?;
                    offset += width;
                )*
                let _ = (cells, offset);
                ::std::result::Result::Ok(())
            }
        }
    })
}

/// Derive macro for implementing the `NamedRecord` trait.
///
/// Requires `Record`. Every bound field must be a single column; the
/// column name is the field name unless renamed.
///
/// ## Attributes
///
/// - `#[rowbind(rename = "column_name")]` - Use a different column name
/// - `#[rowbind(skip)]` - Leave the field unbound
#[proc_macro_derive(NamedRecord, attributes(rowbind))]
pub fn derive_named_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_named_record(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_named_record(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let fields = bound_fields(input)?;

    let types: Vec<_> = fields.iter().map(|f| &f.ty).collect();
    let columns: Vec<_> = fields.iter().map(|f| f.column.as_str()).collect();

    Ok(quote! {
        impl #impl_generics ::rowbind_types::NamedRecord for #name #ty_generics #where_clause {
            fn column_names() -> ::std::vec::Vec<&'static str> {
                #(
                    const {
                        assert!(
                            <#types as ::rowbind_types::Record>::WIDTH == 1,
                            "NamedRecord fields must each bind exactly one column",
                        );
                    }
                )*
                ::std::vec![#(#columns),*]
            }
        }
    })
}
