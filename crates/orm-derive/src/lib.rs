//! # crudmap-derive
//!
//! Derive macro for crudmap entities.
//!
//! - `#[derive(Entity)]`: implement `Entity` from `#[db(...)]` field annotations

use proc_macro::TokenStream;

mod entity;

/// Entity derive macro generating the field-binding table
///
/// ```ignore
/// #[derive(Default, Entity)]
/// #[db(table = "PRODUCTS")]
/// struct Product {
///     #[db("ID,pk,seq=PRODUCTS_SEQ")]
///     id: i64,
///     #[db("NAME")]
///     name: String,
///     // not mapped
///     dirty: bool,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(db))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive_entity_impl(input)
}
