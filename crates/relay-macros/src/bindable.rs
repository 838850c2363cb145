use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, spanned::Spanned};

use crate::case::snake_case;

#[derive(Default)]
struct BindAttrs {
    param: Option<String>,
    entity: Option<String>,
    key: Option<String>,
    relation: Option<String>,
}

pub fn derive_bindable(input: &DeriveInput) -> syn::Result<TokenStream> {
    if !matches!(input.data, Data::Struct(_)) {
        return Err(syn::Error::new(
            input.span(),
            "Bindable can only be derived for structs",
        ));
    }

    let mut attrs = BindAttrs::default();
    for attr in &input.attrs {
        if !attr.path().is_ident("bind") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let slot = if meta.path.is_ident("param") {
                &mut attrs.param
            } else if meta.path.is_ident("entity") {
                &mut attrs.entity
            } else if meta.path.is_ident("key") {
                &mut attrs.key
            } else if meta.path.is_ident("relation") {
                &mut attrs.relation
            } else {
                return Err(meta.error("expected `param`, `entity`, `key` or `relation`"));
            };
            *slot = Some(meta.value()?.parse::<syn::LitStr>()?.value());
            Ok(())
        })?;
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let snake = snake_case(&name.to_string());
    let param = attrs.param.unwrap_or_else(|| snake.clone());
    let entity = attrs.entity.unwrap_or_else(|| format!("{snake}s"));
    let route_key = attrs
        .key
        .map(|key| quote! { const ROUTE_KEY: &'static str = #key; });
    let relation = attrs
        .relation
        .map(|relation| quote! { const RELATION: &'static str = #relation; });

    Ok(quote! {
        impl #impl_generics ::relay_framework::binding::Bindable for #name #ty_generics #where_clause {
            const PARAM: &'static str = #param;
            const ENTITY: &'static str = #entity;
            #route_key
            #relation
        }
    })
}
