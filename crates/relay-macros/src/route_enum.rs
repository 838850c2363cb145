use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, spanned::Spanned};

use crate::case::snake_case;

pub fn derive_route_enum(input: &DeriveInput) -> syn::Result<TokenStream> {
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new(
            input.span(),
            "RouteEnum can only be derived for enums",
        ));
    };

    let mut param = None;
    for attr in &input.attrs {
        if attr.path().is_ident("route") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("param") {
                    param = Some(meta.value()?.parse::<syn::LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `param`"))
                }
            })?;
        }
    }

    let mut values = Vec::with_capacity(data.variants.len());
    let mut arms = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.span(),
                "RouteEnum variants cannot carry fields",
            ));
        }

        let mut value = None;
        for attr in &variant.attrs {
            if attr.path().is_ident("route") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        value = Some(meta.value()?.parse::<syn::LitStr>()?.value());
                        Ok(())
                    } else {
                        Err(meta.error("expected `rename`"))
                    }
                })?;
            }
        }
        let value = value.unwrap_or_else(|| snake_case(&variant.ident.to_string()));
        if values.contains(&value) {
            return Err(syn::Error::new(
                variant.span(),
                format!("route value `{value}` is used by more than one variant"),
            ));
        }

        let ident = &variant.ident;
        arms.push(quote! { #value => ::core::option::Option::Some(Self::#ident), });
        values.push(value);
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let param = param.unwrap_or_else(|| snake_case(&name.to_string()));

    Ok(quote! {
        impl #impl_generics ::relay_framework::binding::RouteEnum for #name #ty_generics #where_clause {
            const PARAM: &'static str = #param;

            fn route_values() -> &'static [&'static str] {
                &[#(#values),*]
            }

            fn from_route_value(value: &str) -> ::core::option::Option<Self> {
                match value {
                    #(#arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    })
}
