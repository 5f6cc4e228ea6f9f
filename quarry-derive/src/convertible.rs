use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::quote;
use syn::{Attribute, DataEnum, DataStruct, DeriveInput, Field, LitStr, Result};

/// Field names listed in `#[converter(ignored = "a, b")]`.
pub(crate) fn ignored_fields(attrs: &[Attribute]) -> Result<Vec<String>> {
    let mut ignored = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("converter") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("ignored") {
                    let s: LitStr = meta.value()?.parse()?;
                    ignored.extend(
                        s.value()
                            .split(',')
                            .map(|field| field.trim().to_string())
                            .filter(|field| !field.is_empty()),
                    );
                    Ok(())
                } else {
                    Err(meta.error("unknown converter attribute"))
                }
            })?;
        }
    }
    Ok(ignored)
}

pub(crate) fn generate_convertible_for_struct(ast: &DeriveInput, data: &DataStruct) -> Result<TokenStream> {
    let ignored = ignored_fields(&ast.attrs)?;

    let fields: Vec<&Field> = match &data.fields {
        syn::Fields::Named(fields) => fields.named.iter().collect(),
        _ => {
            return Err(syn::Error::new_spanned(
                ast,
                "only structs with named fields are supported",
            ))
        }
    };

    let mut put_idents = Vec::new();
    let mut put_names = Vec::new();
    let mut initializers = Vec::with_capacity(fields.len());
    for field in &fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let field_name = ident.to_string();
        let ty = &field.ty;
        if ignored.contains(&field_name) {
            initializers.push(quote! { #ident: ::core::default::Default::default() });
        } else {
            initializers.push(quote! {
                #ident: quarry::common::from_value::<#ty>(&record.get(#field_name))?
            });
            put_idents.push(ident);
            put_names.push(field_name);
        }
    }

    let name = &ast.ident;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let gen = quote! {
        impl #impl_generics quarry::common::Convertible for #name #ty_generics #where_clause {
            fn to_value(&self) -> quarry::errors::QuarryResult<quarry::common::Value> {
                let mut record = quarry::common::Record::new();
                #(record.put(#put_names, quarry::common::to_value(&self.#put_idents)?);)*
                Ok(quarry::common::Value::Record(record))
            }

            fn from_value(value: &quarry::common::Value) -> quarry::errors::QuarryResult<Self> {
                match value {
                    quarry::common::Value::Record(record) => Ok(#name {
                        #(#initializers,)*
                    }),
                    other => Err(quarry::errors::QuarryError::new(
                        &format!("cannot map {} to {}", other.type_name(), #type_name),
                        quarry::errors::ErrorKind::ObjectMappingError,
                    )),
                }
            }
        }
    };

    Ok(TokenStream::from(gen))
}

/// Unit variants map to their name as a string. Variants with data map to
/// a record `{ variant, value }`.
pub(crate) fn generate_convertible_for_enum(ast: &DeriveInput, data: &DataEnum) -> Result<TokenStream> {
    let name = &ast.ident;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let mut to_value_arms = Vec::with_capacity(data.variants.len());
    let mut unit_arms = Vec::new();
    let mut data_arms = Vec::new();

    for variant in &data.variants {
        let variant_ident = &variant.ident;
        let variant_name = variant_ident.to_string();

        match &variant.fields {
            syn::Fields::Unit => {
                to_value_arms.push(quote! {
                    #name::#variant_ident => Ok(quarry::common::Value::from(#variant_name))
                });
                unit_arms.push(quote! {
                    #variant_name => Ok(#name::#variant_ident)
                });
            }
            syn::Fields::Named(fields) => {
                let idents: Vec<&Ident> =
                    fields.named.iter().filter_map(|f| f.ident.as_ref()).collect();
                let names: Vec<String> = idents.iter().map(|i| i.to_string()).collect();
                let types: Vec<&syn::Type> = fields.named.iter().map(|f| &f.ty).collect();

                to_value_arms.push(quote! {
                    #name::#variant_ident { #(#idents),* } => {
                        let mut inner = quarry::common::Record::new();
                        #(inner.put(#names, quarry::common::to_value(#idents)?);)*
                        Ok(quarry::common::Value::Record(
                            quarry::common::Record::new()
                                .with("variant", #variant_name)
                                .with("value", inner),
                        ))
                    }
                });
                data_arms.push(quote! {
                    Some(#variant_name) => {
                        let inner = payload.as_record().ok_or_else(|| mismatch(&payload))?;
                        Ok(#name::#variant_ident {
                            #(#idents: quarry::common::from_value::<#types>(&inner.get(#names))?,)*
                        })
                    }
                });
            }
            syn::Fields::Unnamed(fields) => {
                let count = fields.unnamed.len();
                let idents: Vec<Ident> = (0..count)
                    .map(|i| Ident::new(&format!("field_{}", i), Span::call_site()))
                    .collect();
                let indices: Vec<usize> = (0..count).collect();
                let types: Vec<&syn::Type> = fields.unnamed.iter().map(|f| &f.ty).collect();

                to_value_arms.push(quote! {
                    #name::#variant_ident(#(#idents),*) => {
                        let items = vec![#(quarry::common::to_value(#idents)?),*];
                        Ok(quarry::common::Value::Record(
                            quarry::common::Record::new()
                                .with("variant", #variant_name)
                                .with("value", quarry::common::Value::Array(items)),
                        ))
                    }
                });
                data_arms.push(quote! {
                    Some(#variant_name) => {
                        let items = payload.as_array().ok_or_else(|| mismatch(&payload))?;
                        if items.len() != #count {
                            return Err(mismatch(&payload));
                        }
                        Ok(#name::#variant_ident(
                            #(quarry::common::from_value::<#types>(&items[#indices])?,)*
                        ))
                    }
                });
            }
        }
    }

    let record_arm = if data_arms.is_empty() {
        quote! {}
    } else {
        quote! {
            quarry::common::Value::Record(record) => {
                let variant = record.get("variant");
                let payload = record.get("value");
                match variant.as_string().map(|s| s.as_str()) {
                    #(#data_arms,)*
                    _ => Err(mismatch(value)),
                }
            }
        }
    };

    let gen = quote! {
        impl #impl_generics quarry::common::Convertible for #name #ty_generics #where_clause {
            fn to_value(&self) -> quarry::errors::QuarryResult<quarry::common::Value> {
                match self {
                    #(#to_value_arms,)*
                }
            }

            fn from_value(value: &quarry::common::Value) -> quarry::errors::QuarryResult<Self> {
                let mismatch = |value: &quarry::common::Value| {
                    quarry::errors::QuarryError::new(
                        &format!("cannot map {} to {}", value, #type_name),
                        quarry::errors::ErrorKind::ObjectMappingError,
                    )
                };
                match value {
                    quarry::common::Value::String(variant) => match variant.as_str() {
                        #(#unit_arms,)*
                        _ => Err(mismatch(value)),
                    },
                    #record_arm
                    _ => Err(mismatch(value)),
                }
            }
        }
    };

    Ok(TokenStream::from(gen))
}
