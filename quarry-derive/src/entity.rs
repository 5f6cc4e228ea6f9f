use crate::convertible::ignored_fields;
use proc_macro::TokenStream;
use quote::quote;
use syn::{DataStruct, DeriveInput, GenericArgument, LitStr, PathArguments, Result, Type};

pub(crate) fn generate_entity_for_struct(
    ast: &DeriveInput,
    data: &DataStruct,
) -> Result<TokenStream> {
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let named = match &data.fields {
        syn::Fields::Named(fields) => &fields.named,
        _ => {
            return Err(syn::Error::new_spanned(
                ast,
                "only structs with named fields can be entities",
            ))
        }
    };

    let mut entity_name = snake_case(&name.to_string());
    let mut id_field_name = "id".to_string();
    let mut id_found = false;
    let mut assigned = false;
    // (field, eager)
    let mut fetch_overrides: Vec<(String, bool)> = Vec::new();

    for attr in &ast.attrs {
        if attr.path().is_ident("entity") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let s: LitStr = meta.value()?.parse()?;
                    entity_name = s.value();
                    Ok(())
                } else if meta.path.is_ident("id") {
                    if id_found {
                        return Err(meta.error("Multiple id attributes are not allowed"));
                    }
                    id_found = true;

                    meta.parse_nested_meta(|meta| {
                        if meta.path.is_ident("field") {
                            let s: LitStr = meta.value()?.parse()?;
                            id_field_name = s.value();
                            Ok(())
                        } else if meta.path.is_ident("strategy") {
                            let s: LitStr = meta.value()?.parse()?;
                            match s.value().as_str() {
                                "generated" => assigned = false,
                                "assigned" => assigned = true,
                                other => {
                                    return Err(meta.error(format!(
                                        "Unknown id strategy {}, expected generated or assigned",
                                        other
                                    )))
                                }
                            }
                            Ok(())
                        } else {
                            Err(meta.error("Unknown id attribute"))
                        }
                    })
                } else if meta.path.is_ident("relation") {
                    let mut field: Option<String> = None;
                    let mut eager = false;

                    meta.parse_nested_meta(|meta| {
                        if meta.path.is_ident("field") {
                            let s: LitStr = meta.value()?.parse()?;
                            field = Some(s.value());
                            Ok(())
                        } else if meta.path.is_ident("fetch") {
                            let s: LitStr = meta.value()?.parse()?;
                            match s.value().as_str() {
                                "eager" => eager = true,
                                "lazy" => eager = false,
                                other => {
                                    return Err(meta.error(format!(
                                        "Unknown fetch type {}, expected eager or lazy",
                                        other
                                    )))
                                }
                            }
                            Ok(())
                        } else {
                            Err(meta.error("Unknown relation attribute"))
                        }
                    })
                    .and_then(|_| match field.take() {
                        Some(field) => {
                            fetch_overrides.push((field, eager));
                            Ok(())
                        }
                        None => Err(meta.error("Relation field is required")),
                    })
                } else {
                    Err(meta.error("Unknown entity attribute"))
                }
            })?
        }
    }

    let ignored = ignored_fields(&ast.attrs)?;
    let field_names: Vec<String> = named
        .iter()
        .filter_map(|field| field.ident.as_ref().map(|ident| ident.to_string()))
        .filter(|field| !ignored.contains(field))
        .collect();

    let id_field = named
        .iter()
        .find(|field| field.ident.as_ref().is_some_and(|ident| ident == &id_field_name))
        .ok_or_else(|| {
            syn::Error::new_spanned(ast, format!("Field {} not found in struct", id_field_name))
        })?;
    if ignored.contains(&id_field_name) {
        return Err(syn::Error::new_spanned(
            id_field,
            "the identity field cannot be ignored",
        ));
    }
    let id_ident = &id_field.ident;

    let (id_type, id_code, set_id_code) = match generic_argument(&id_field.ty, "Option") {
        Some(inner) => (
            quote! { #inner },
            quote! { self.#id_ident.clone() },
            quote! { self.#id_ident = Some(id); },
        ),
        None => {
            let ty = &id_field.ty;
            (
                quote! { #ty },
                quote! { Some(self.#id_ident.clone()) },
                quote! { self.#id_ident = id; },
            )
        }
    };

    let mut relations = Vec::new();
    for field in named {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_name = ident.to_string();
        if ignored.contains(&field_name) {
            continue;
        }
        if let Some(target) = generic_argument(&field.ty, "Reference") {
            let eager = fetch_overrides
                .iter()
                .find(|(name, _)| name == &field_name)
                .is_some_and(|(_, eager)| *eager);
            let fetch = if eager {
                quote! { quarry::entity::FetchType::Eager }
            } else {
                quote! { quarry::entity::FetchType::Lazy }
            };
            relations.push(quote! {
                quarry::entity::Relation::new(
                    #field_name,
                    <#target as quarry::entity::Entity>::meta,
                    #fetch,
                )
            });
        }
    }

    for (field, _) in &fetch_overrides {
        let is_reference = named.iter().any(|f| {
            f.ident.as_ref().is_some_and(|ident| ident == field)
                && generic_argument(&f.ty, "Reference").is_some()
        });
        if !is_reference {
            return Err(syn::Error::new_spanned(
                ast,
                format!("Relation field {} is not a Reference field", field),
            ));
        }
    }

    let strategy = if assigned {
        quote! { quarry::entity::IdStrategy::Assigned }
    } else {
        quote! { quarry::entity::IdStrategy::Generated }
    };

    let relations_code = if relations.is_empty() {
        quote! {}
    } else {
        quote! {
            fn relations() -> Vec<quarry::entity::Relation> {
                vec![#(#relations),*]
            }
        }
    };

    let gen = quote! {
        impl #impl_generics quarry::entity::Entity for #name #ty_generics #where_clause {
            type Id = #id_type;

            fn entity_name() -> &'static str {
                #entity_name
            }

            fn id_field() -> &'static str {
                #id_field_name
            }

            fn id_strategy() -> quarry::entity::IdStrategy {
                #strategy
            }

            fn fields() -> &'static [&'static str] {
                &[#(#field_names),*]
            }

            #relations_code

            fn id(&self) -> Option<Self::Id> {
                #id_code
            }

            fn set_id(&mut self, id: Self::Id) {
                #set_id_code
            }
        }
    };

    Ok(TokenStream::from(gen))
}

/// The single type argument of `wrapper<T>`, matched on the last path
/// segment so `Option<T>` and `std::option::Option<T>` both qualify.
fn generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) if args.args.len() == 1 => match args.args.first() {
            Some(GenericArgument::Type(inner)) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

fn snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
