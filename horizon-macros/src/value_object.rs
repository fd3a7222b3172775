use crate::utils::{apply_derives, expect_bool, parse_kvs};
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Item, Result, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[value_object] 宏实现
/// - 支持结构体（具名或 tuple）与枚举
/// - 合并/追加派生：Default, Clone, (Debug 可控), Serialize, Deserialize, PartialEq, Eq
/// - 参数：`debug = true|false`（默认 true），`ord = true|false`（默认 false）
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as ValueObjectAttrConfig);
    let mut input = parse_macro_input!(item as Item);

    let mut required: Vec<syn::Path> = vec![
        syn::parse_quote!(Default),
        syn::parse_quote!(Clone),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
        syn::parse_quote!(PartialEq),
        syn::parse_quote!(Eq),
    ];

    if cfg.derive_debug {
        required.insert(0, syn::parse_quote!(Debug));
    }

    if cfg.ord {
        required.extend([
            syn::parse_quote!(Copy),
            syn::parse_quote!(PartialOrd),
            syn::parse_quote!(Ord),
            syn::parse_quote!(Hash),
        ]);
    }

    match &mut input {
        Item::Struct(st) => {
            apply_derives(&mut st.attrs, required);
            TokenStream::from(quote! { #st })
        }
        Item::Enum(en) => {
            apply_derives(&mut en.attrs, required);
            TokenStream::from(quote! { #en })
        }
        other => syn::Error::new(other.span(), "#[value_object] only supports struct or enum")
            .to_compile_error()
            .into(),
    }
}

struct ValueObjectAttrConfig {
    derive_debug: bool,
    ord: bool,
}

impl Parse for ValueObjectAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut derive_debug: Option<bool> = None;
        let mut ord: Option<bool> = None;

        if !input.is_empty() {
            for kv in parse_kvs(input)? {
                let slot = match kv.key.to_string().as_str() {
                    "debug" => &mut derive_debug,
                    "ord" => &mut ord,
                    _ => {
                        return Err(syn::Error::new(
                            kv.key.span(),
                            "unknown key in attribute; expected 'debug' | 'ord'",
                        ));
                    }
                };
                if slot.is_some() {
                    return Err(syn::Error::new(
                        kv.key.span(),
                        format!("duplicate key '{}' in attribute", kv.key),
                    ));
                }
                *slot = Some(expect_bool(&kv.value, &kv.key.to_string())?);
            }
        }

        Ok(Self {
            derive_debug: derive_debug.unwrap_or(true),
            ord: ord.unwrap_or(false),
        })
    }
}
