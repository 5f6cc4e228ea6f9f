#![recursion_limit = "128"]
//! # Quarry Derive Macros
//!
//! Procedural macros that implement the quarry traits for user types.
//!
//! ## Macros
//!
//! ### `Convertible`
//!
//! Derives `quarry::common::Convertible`, converting a type to and from a
//! `Record` value.
//!
//! - **Supported for**: structs with named fields, and enums
//! - **Type attribute**: `#[converter(ignored = "field1, field2")]` skips
//!   fields; they are restored with `Default::default()`
//!
//! ```rust,ignore
//! use quarry_derive::Convertible;
//!
//! #[derive(Convertible)]
//! pub struct MemberDto {
//!     pub username: String,
//!     pub team_name: Option<String>,
//! }
//!
//! #[derive(Convertible)]
//! pub enum Grade {
//!     Junior,
//!     Senior,
//! }
//! ```
//!
//! ### `Entity`
//!
//! Derives `quarry::entity::Entity` for a struct that also derives
//! `Convertible`.
//!
//! ```rust,ignore
//! use quarry::entity::Reference;
//! use quarry_derive::{Convertible, Entity};
//!
//! #[derive(Debug, Clone, Default, Convertible, Entity)]
//! #[entity(name = "member", id(field = "id"), relation(field = "team", fetch = "lazy"))]
//! pub struct Member {
//!     pub id: Option<i64>,
//!     pub username: String,
//!     pub age: i32,
//!     pub team: Reference<Team>,
//! }
//! ```
//!
//! - `name` defaults to the struct name in snake case.
//! - `id(field = "..", strategy = "generated" | "assigned")`: the field
//!   defaults to `id` and the strategy to `generated`. An `Option<X>` field
//!   gives the identity type `X`.
//! - Every `Reference<T>` field is a lazy relation to `T`;
//!   `relation(field = "..", fetch = "eager")` changes that.

extern crate proc_macro;
mod convertible;
mod entity;

use crate::convertible::{generate_convertible_for_enum, generate_convertible_for_struct};
use crate::entity::generate_entity_for_struct;
use proc_macro::TokenStream;
use syn::{Data, DeriveInput};

/// Derives the `Convertible` trait.
///
/// # Errors
///
/// Returns a compile error for tuple structs, unit structs and unions.
#[proc_macro_derive(Convertible, attributes(converter))]
pub fn derive_convertible(input: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(input as DeriveInput);

    let result = match ast.data {
        Data::Struct(ref data) => generate_convertible_for_struct(&ast, data),
        Data::Enum(ref data) => generate_convertible_for_enum(&ast, data),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &ast,
            "unions are not supported by the Convertible derive macro",
        )),
    };

    match result {
        Ok(token_stream) => token_stream,
        Err(e) => syn::Error::new_spanned(
            &ast,
            format!("Failed to derive Convertible for '{}': {}", ast.ident, e),
        )
        .to_compile_error()
        .into(),
    }
}

/// Derives the `Entity` trait. Must be combined with `#[derive(Convertible)]`.
///
/// # Errors
///
/// Returns a compile error if:
/// - the type is not a struct with named fields
/// - the identity field or a relation field does not exist
/// - a `relation` attribute names a field that is not a `Reference`
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(input as DeriveInput);

    let result = match ast.data {
        Data::Struct(ref data) => generate_entity_for_struct(&ast, data),
        _ => Err(syn::Error::new_spanned(
            &ast,
            "only structs with named fields can be entities",
        )),
    };

    match result {
        Ok(token_stream) => token_stream,
        Err(e) => syn::Error::new_spanned(
            &ast,
            format!(
                "Failed to derive Entity for struct '{}': {}.\n\
                 Example: #[entity(name = \"member\", id(field = \"id\"))]",
                ast.ident, e
            ),
        )
        .to_compile_error()
        .into(),
    }
}
