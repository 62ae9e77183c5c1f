//! Entity derive macro implementation
//!
//! Reads `#[db("COLUMN[,pk][,seq=SEQUENCE]")]` on fields and an optional
//! `#[db(table = "NAME")]` on the struct, checks the annotation grammar and
//! emits an `Entity` impl whose bindings clone each field into a
//! `DatabaseValue` and convert column values back on assignment.

use proc_macro::TokenStream;
use proc_macro2::Ident;
use quote::quote;
use syn::{parse::Result, parse_macro_input, Attribute, Data, DeriveInput, Error, Fields, LitStr};

/// Main implementation function for the Entity derive
pub fn derive_entity_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match process_entity(&input) {
        Ok(result) => result.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// A field carrying a `#[db("...")]` annotation
struct MappedField {
    ident: Ident,
    annotation: LitStr,
}

fn process_entity(input: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let table = table_name(input)?;
    let fields = mapped_fields(input)?;

    let mut primary_key: Option<&MappedField> = None;
    for field in &fields {
        if !check_annotation(&field.annotation)? {
            continue;
        }
        if let Some(first) = primary_key {
            return Err(Error::new_spanned(
                &field.annotation,
                format!(
                    "entity already has primary key `{}`; only one field may be marked `pk`",
                    first.ident
                ),
            ));
        }
        primary_key = Some(field);
    }

    let bindings = fields.iter().map(|field| {
        let ident = &field.ident;
        let field_name = ident.to_string();
        let annotation = &field.annotation;

        quote! {
            ::crudmap::FieldBinding::new(
                #field_name,
                #annotation,
                |entity: &Self| {
                    ::crudmap::DatabaseValue::from(::std::clone::Clone::clone(&entity.#ident))
                },
                |entity: &mut Self, value: ::crudmap::DatabaseValue| {
                    entity.#ident = value.into_field()?;
                    ::std::result::Result::Ok(())
                },
            )
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::crudmap::Entity for #name #ty_generics #where_clause {
            fn table_name() -> &'static str {
                #table
            }

            fn fields() -> ::std::vec::Vec<::crudmap::FieldBinding<Self>> {
                ::std::vec![#(#bindings),*]
            }
        }
    })
}

/// `#[db(table = "...")]` on the struct, or the struct name upper-cased
fn table_name(input: &DeriveInput) -> Result<String> {
    let mut table = None;

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("db")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().trim().is_empty() {
                    return Err(Error::new_spanned(&value, "table name cannot be empty"));
                }
                table = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported db attribute; expected `table = \"NAME\"`"))
            }
        })?;
    }

    Ok(table.unwrap_or_else(|| input.ident.to_string().to_uppercase()))
}

/// Fields with a `#[db("...")]` attribute, in declaration order
fn mapped_fields(input: &DeriveInput) -> Result<Vec<MappedField>> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(Error::new_spanned(
                    &input.ident,
                    "#[derive(Entity)] requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new_spanned(
                &input.ident,
                "#[derive(Entity)] can only be applied to structs",
            ))
        }
    };

    let mut mapped = Vec::new();
    for field in fields {
        let annotation = match field_annotation(&field.attrs)? {
            Some(annotation) => annotation,
            None => continue,
        };
        if let Some(ident) = &field.ident {
            mapped.push(MappedField {
                ident: ident.clone(),
                annotation,
            });
        }
    }

    Ok(mapped)
}

fn field_annotation(attrs: &[Attribute]) -> Result<Option<LitStr>> {
    let mut annotation = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("db")) {
        if annotation.is_some() {
            return Err(Error::new_spanned(attr, "field has more than one #[db] attribute"));
        }
        annotation = Some(attr.parse_args::<LitStr>()?);
    }

    Ok(annotation)
}

/// Check `COLUMN[,pk][,seq=SEQUENCE]`; returns whether the field is the primary key
fn check_annotation(annotation: &LitStr) -> Result<bool> {
    let text = annotation.value();
    let mut tokens = text.split(',').map(str::trim);

    if tokens.next().map_or(true, str::is_empty) {
        return Err(Error::new_spanned(
            annotation,
            "annotation needs a column name before any flag",
        ));
    }

    let mut is_primary_key = false;
    let mut has_sequence = false;
    for token in tokens {
        if token == "pk" {
            if is_primary_key {
                return Err(Error::new_spanned(annotation, "flag `pk` is repeated"));
            }
            is_primary_key = true;
            continue;
        }

        match token.split_once('=') {
            Some((key, value)) if key.trim() == "seq" => {
                if has_sequence {
                    return Err(Error::new_spanned(annotation, "flag `seq` is repeated"));
                }
                if value.trim().is_empty() {
                    return Err(Error::new_spanned(annotation, "`seq=` needs a sequence name"));
                }
                has_sequence = true;
            }
            _ => {
                return Err(Error::new_spanned(
                    annotation,
                    format!("unknown flag `{}`; expected `pk` or `seq=NAME`", token),
                ))
            }
        }
    }

    if has_sequence && !is_primary_key {
        return Err(Error::new_spanned(annotation, "`seq=` is only allowed on the `pk` field"));
    }

    Ok(is_primary_key)
}
