use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::{Attribute, Expr, Ident, Token, parse::Parse, parse::ParseStream};

// 提取非 derive 属性与已有 derive 列表
pub(crate) fn split_derives(attrs: &[Attribute]) -> (Vec<Attribute>, Vec<syn::Path>) {
    let mut retained = Vec::new();
    let mut existing = Vec::new();
    for attr in attrs.iter() {
        if attr.path().is_ident("derive") {
            if let Ok(list) =
                attr.parse_args_with(Punctuated::<syn::Path, Token![,]>::parse_terminated)
            {
                existing.extend(list);
            }
        } else {
            retained.push(attr.clone());
        }
    }
    (retained, existing)
}

// 合并默认与已有 derive（去重，优先保留 required）
pub(crate) fn merge_derives(existing: Vec<syn::Path>, required: Vec<syn::Path>) -> Attribute {
    let mut seen = std::collections::HashSet::<String>::new();
    let mut final_list: Vec<syn::Path> = Vec::new();
    for p in required.into_iter().chain(existing) {
        if seen.insert(derive_key(&p)) {
            final_list.push(p);
        }
    }
    syn::parse_quote!(#[derive(#(#final_list),*)])
}

// 归一化 derive 的 key，避免 Serialize/serde::Serialize 重复
pub(crate) fn derive_key(p: &syn::Path) -> String {
    match p.segments.last() {
        Some(last) => {
            let last_ident = last.ident.to_string();
            match last_ident.as_str() {
                "Serialize" | "Deserialize" => format!("serde::{}", last_ident),
                _ => last_ident,
            }
        }
        None => p.to_token_stream().to_string(),
    }
}

// 直接在 attrs 上应用默认派生合并
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<syn::Path>) {
    let (retained, existing) = split_derives(attrs);
    let merged = merge_derives(existing, required);
    *attrs = std::iter::once(merged).chain(retained).collect();
}

/// 形如 `key = value` 的属性参数
pub(crate) struct AttrKv {
    pub key: Ident,
    #[allow(dead_code)]
    pub eq: Token![=],
    pub value: Expr,
}

impl Parse for AttrKv {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        Ok(Self {
            key: input.parse()?,
            eq: input.parse()?,
            value: input.parse()?,
        })
    }
}

pub(crate) fn parse_kvs(input: ParseStream) -> syn::Result<Punctuated<AttrKv, Token![,]>> {
    Punctuated::<AttrKv, Token![,]>::parse_terminated(input)
}

pub(crate) fn expect_str(expr: &Expr, key: &str) -> syn::Result<syn::LitStr> {
    match expr {
        Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(lit),
            ..
        }) => Ok(lit.clone()),
        other => Err(syn::Error::new_spanned(
            other,
            format!("expected string literal for '{key}'"),
        )),
    }
}

pub(crate) fn expect_bool(expr: &Expr, key: &str) -> syn::Result<bool> {
    match expr {
        Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Bool(b),
            ..
        }) => Ok(b.value()),
        other => Err(syn::Error::new_spanned(
            other,
            format!("expected boolean literal for '{key}'"),
        )),
    }
}
