use proc_macro2::Span;
use quote::ToTokens;
use syn::{Attribute, Field, FieldsNamed, Ident, Token, Type, punctuated::Punctuated};

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

// 归一化 derive 的 key，避免 Serialize/serde::Serialize 重复
fn derive_key(p: &syn::Path) -> String {
    match p.segments.last() {
        Some(last) => last.ident.to_string(),
        None => p.to_token_stream().to_string(),
    }
}

// 合并必需与已有 derive 并写回 attrs，必需项在前
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<syn::Path>) {
    let (retained, existing) = split_derives(attrs);
    let mut seen = std::collections::HashSet::<String>::new();
    let merged: Vec<syn::Path> = required
        .into_iter()
        .chain(existing)
        .filter(|p| seen.insert(derive_key(p)))
        .collect();
    let derive: Attribute = syn::parse_quote!(#[derive(#(#merged),*)]);
    *attrs = std::iter::once(derive).chain(retained).collect();
}

pub(crate) fn has_field_named(fields: &FieldsNamed, name: &str) -> bool {
    fields
        .named
        .iter()
        .any(|f| f.ident.as_ref().map(|i| i == name).unwrap_or(false))
}

/// 缺失的必需字段按给定顺序插入到最前，已有字段保持原位
pub(crate) fn ensure_required_fields(fields: &mut FieldsNamed, required: &[(&str, Type)]) {
    let mut new_named: Punctuated<Field, Token![,]> = Punctuated::new();
    for (name, ty) in required {
        if !has_field_named(fields, name) {
            let ident = Ident::new(name, Span::call_site());
            new_named.push(syn::parse_quote! { #ident: #ty });
        }
    }
    new_named.extend(fields.named.clone());
    fields.named = new_named;
}

pub(crate) fn has_attr(attrs: &[Attribute], path: &str, needle: &str) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident(path) && attr.meta.to_token_stream().to_string().contains(needle)
    })
}
