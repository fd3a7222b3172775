use crate::utils::{apply_derives, expect_str, parse_kvs};
use proc_macro::TokenStream;
use quote::quote;
use std::collections::HashSet;
use syn::spanned::Spanned;
use syn::{Item, Result, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[action] 宏实现
/// - 仅支持枚举；变体形态不限（具名、元组、单元）
/// - 生成 `::horizon_domain::message::Action` 实现（TYPES / action_type）
/// - 枚举级：`#[action(prefix = "...")]`
/// - 变体级：`#[action(action_type = "...")]` 覆写类型名
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as ActionAttrConfig);
    let mut input = parse_macro_input!(item as Item);

    let enum_item = match &mut input {
        Item::Enum(e) => e,
        other => {
            return syn::Error::new(other.span(), "#[action] can only be used on enum types")
                .to_compile_error()
                .into();
        }
    };

    // 合并/追加默认派生：Debug, Clone, PartialEq, Serialize, Deserialize
    let required: Vec<syn::Path> = vec![
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    apply_derives(&mut enum_item.attrs, required);

    let enum_name = enum_item.ident.to_string();
    let mut names: Vec<(syn::Ident, String)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for v in &mut enum_item.variants {
        let mut retained = Vec::new();
        let mut custom: Option<syn::LitStr> = None;

        for attr in v.attrs.iter() {
            if !attr.path().is_ident("action") {
                retained.push(attr.clone());
                continue;
            }
            let lit = match parse_variant_attr(attr) {
                Ok(lit) => lit,
                Err(err) => return err.to_compile_error().into(),
            };
            if custom.is_some() {
                return syn::Error::new(
                    attr.span(),
                    "duplicate 'action_type' specified for this variant",
                )
                .to_compile_error()
                .into();
            }
            custom = Some(lit);
        }
        v.attrs = retained;

        let name = match custom {
            Some(lit) => lit.value(),
            None => match &cfg.prefix {
                Some(prefix) => format!("{}.{}.{}", prefix.value(), enum_name, v.ident),
                None => format!("{}.{}", enum_name, v.ident),
            },
        };

        if !seen.insert(name.clone()) {
            return syn::Error::new(v.span(), format!("duplicate action type '{name}'"))
                .to_compile_error()
                .into();
        }
        names.push((v.ident.clone(), name));
    }

    let enum_ident = &enum_item.ident;
    let (impl_generics, ty_generics, where_clause) = enum_item.generics.split_for_impl();

    let type_lits = names.iter().map(|(_, name)| quote! { #name });
    let arms = names.iter().map(|(ident, name)| {
        quote! { Self::#ident { .. } => #name }
    });

    let out = quote! {
        #enum_item

        impl #impl_generics ::horizon_domain::message::Action for #enum_ident #ty_generics #where_clause {
            const TYPES: &'static [&'static str] = &[ #( #type_lits ),* ];

            fn action_type(&self) -> &'static str {
                match *self { #( #arms, )* }
            }
        }
    };

    TokenStream::from(out)
}

fn parse_variant_attr(attr: &syn::Attribute) -> Result<syn::LitStr> {
    let pairs = attr.parse_args_with(parse_kvs)?;
    let mut found: Option<syn::LitStr> = None;

    for kv in pairs {
        match kv.key.to_string().as_str() {
            "action_type" => {
                if found.is_some() {
                    return Err(syn::Error::new(
                        kv.key.span(),
                        "duplicate key 'action_type' in attribute",
                    ));
                }
                found = Some(expect_str(&kv.value, "action_type")?);
            }
            _ => {
                return Err(syn::Error::new(
                    kv.key.span(),
                    "unknown key; expected 'action_type'",
                ));
            }
        }
    }

    found.ok_or_else(|| syn::Error::new(attr.span(), "expected #[action(action_type = \"...\")]"))
}

// 枚举级配置：类型名前缀
struct ActionAttrConfig {
    prefix: Option<syn::LitStr>,
}

impl Parse for ActionAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut prefix: Option<syn::LitStr> = None;

        if input.is_empty() {
            return Ok(Self { prefix });
        }

        for kv in parse_kvs(input)? {
            match kv.key.to_string().as_str() {
                "prefix" => {
                    if prefix.is_some() {
                        return Err(syn::Error::new(
                            kv.key.span(),
                            "duplicate key 'prefix' in attribute",
                        ));
                    }
                    prefix = Some(expect_str(&kv.value, "prefix")?);
                }
                _ => {
                    return Err(syn::Error::new(
                        kv.key.span(),
                        "unknown key; expected 'prefix'",
                    ));
                }
            }
        }

        Ok(Self { prefix })
    }
}
