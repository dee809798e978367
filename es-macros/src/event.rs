use crate::utils::{apply_derives, ensure_required_fields, has_attr};
use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    Fields, Item, ItemEnum, ItemStruct, LitStr, Meta, Result, Token, Type, parse::Parse,
    parse::ParseStream, parse_macro_input,
};

/// #[event] 宏实现
/// - 结构体：补齐 `id/version/at` 字段，合并默认派生，生成 `Event` 实现；
///   `#[event(name = "...")]` 覆写类型名，默认取结构体名
/// - 枚举：每个变体须为单字段元组 `Variant(Type)`，生成委托的 `Event` 实现与 `From<Type>`；
///   默认以 `#[serde(untagged)]` 序列化为内部事件本身，`#[event(proto)]` 则生成 `ProtoEvent`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as EventAttrConfig);
    let input = parse_macro_input!(item as Item);

    let out = match input {
        Item::Struct(st) => expand_struct(cfg, st),
        Item::Enum(en) => expand_enum(cfg, en),
        other => Err(syn::Error::new(
            other.span(),
            "#[event] can only be used on structs or enums",
        )),
    };

    match out {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_struct(cfg: EventAttrConfig, mut st: ItemStruct) -> Result<proc_macro2::TokenStream> {
    if cfg.proto {
        return Err(syn::Error::new(
            st.ident.span(),
            "'proto' applies to event enums; implement prost::Message on the struct instead",
        ));
    }

    let fields = match &mut st.fields {
        Fields::Named(f) => f,
        other => {
            return Err(syn::Error::new(
                other.span(),
                "#[event] supports only named-field structs",
            ));
        }
    };

    let id_ty: Type = syn::parse_quote! { String };
    let version_ty: Type = syn::parse_quote! { u64 };
    let at_ty: Type =
        syn::parse_quote! { ::es_domain::chrono::DateTime<::es_domain::chrono::Utc> };
    ensure_required_fields(
        fields,
        &[("id", id_ty), ("version", version_ty), ("at", at_ty)],
    );

    apply_derives(
        &mut st.attrs,
        vec![
            syn::parse_quote!(Debug),
            syn::parse_quote!(Clone),
            syn::parse_quote!(PartialEq),
            syn::parse_quote!(Default),
            syn::parse_quote!(serde::Serialize),
            syn::parse_quote!(serde::Deserialize),
        ],
    );

    let ident = &st.ident;
    let name = cfg
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    Ok(quote! {
        #st

        impl #impl_generics ::es_domain::event::Event for #ident #ty_generics #where_clause {
            fn aggregate_id(&self) -> &str {
                ::core::convert::AsRef::<str>::as_ref(&self.id)
            }

            fn version(&self) -> u64 {
                ::core::convert::Into::<u64>::into(self.version)
            }

            fn occurred_at(&self) -> ::es_domain::chrono::DateTime<::es_domain::chrono::Utc> {
                self.at
            }

            fn event_type(&self) -> &str {
                #name
            }
        }
    })
}

fn expand_enum(cfg: EventAttrConfig, mut en: ItemEnum) -> Result<proc_macro2::TokenStream> {
    if let Some(name) = &cfg.name {
        return Err(syn::Error::new(
            name.span(),
            "'name' applies to event structs; each variant keeps its own type name",
        ));
    }
    if en.variants.is_empty() {
        return Err(syn::Error::new(
            en.ident.span(),
            "#[event] enum needs at least one variant",
        ));
    }

    let mut variants = Vec::with_capacity(en.variants.len());
    for v in &en.variants {
        match &v.fields {
            Fields::Unnamed(f) if f.unnamed.len() == 1 => {
                variants.push((v.ident.clone(), f.unnamed[0].ty.clone()));
            }
            _ => {
                return Err(syn::Error::new(
                    v.span(),
                    "#[event] enums support only single-field tuple variants, e.g., Created(Created)",
                ));
            }
        }
    }

    let mut required: Vec<syn::Path> = vec![
        syn::parse_quote!(Debug),
        syn::parse_quote!(Clone),
        syn::parse_quote!(PartialEq),
    ];
    if !cfg.proto {
        required.push(syn::parse_quote!(serde::Serialize));
    }
    apply_derives(&mut en.attrs, required);
    if !cfg.proto && !has_attr(&en.attrs, "serde", "untagged") {
        en.attrs.push(syn::parse_quote!(#[serde(untagged)]));
    }

    let ident = &en.ident;
    let (impl_generics, ty_generics, where_clause) = en.generics.split_for_impl();
    let v_idents: Vec<_> = variants.iter().map(|(v, _)| v).collect();

    let from_impls = variants.iter().map(|(v, ty)| {
        quote! {
            impl #impl_generics ::core::convert::From<#ty> for #ident #ty_generics #where_clause {
                fn from(event: #ty) -> Self {
                    Self::#v(event)
                }
            }
        }
    });

    let proto_impl = cfg.proto.then(|| {
        quote! {
            impl #impl_generics ::es_domain::serializer::ProtoEvent for #ident #ty_generics #where_clause {
                fn encode_message(&self) -> ::core::option::Option<::std::vec::Vec<u8>> {
                    match self {
                        #( Self::#v_idents(e) => ::core::option::Option::Some(::es_domain::prost::Message::encode_to_vec(e)), )*
                    }
                }
            }
        }
    });

    Ok(quote! {
        #en

        impl #impl_generics ::es_domain::event::Event for #ident #ty_generics #where_clause {
            fn aggregate_id(&self) -> &str {
                match self { #( Self::#v_idents(e) => ::es_domain::event::Event::aggregate_id(e), )* }
            }

            fn version(&self) -> u64 {
                match self { #( Self::#v_idents(e) => ::es_domain::event::Event::version(e), )* }
            }

            fn occurred_at(&self) -> ::es_domain::chrono::DateTime<::es_domain::chrono::Utc> {
                match self { #( Self::#v_idents(e) => ::es_domain::event::Event::occurred_at(e), )* }
            }

            fn event_type(&self) -> &str {
                match self { #( Self::#v_idents(e) => ::es_domain::event::Event::event_type(e), )* }
            }
        }

        #( #from_impls )*

        #proto_impl
    })
}

// 属性配置：`name = "..."`、`proto`
#[derive(Default)]
struct EventAttrConfig {
    name: Option<LitStr>,
    proto: bool,
}

impl Parse for EventAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut cfg = EventAttrConfig::default();
        let metas = Punctuated::<Meta, Token![,]>::parse_terminated(input)?;

        for meta in metas {
            match &meta {
                Meta::NameValue(nv) if nv.path.is_ident("name") => {
                    if cfg.name.is_some() {
                        return Err(syn::Error::new(nv.span(), "duplicate key 'name'"));
                    }
                    match &nv.value {
                        syn::Expr::Lit(syn::ExprLit {
                            lit: syn::Lit::Str(lit),
                            ..
                        }) => cfg.name = Some(lit.clone()),
                        other => {
                            return Err(syn::Error::new(
                                other.span(),
                                "expected string literal for 'name'",
                            ));
                        }
                    }
                }
                Meta::Path(p) if p.is_ident("proto") => cfg.proto = true,
                other => {
                    return Err(syn::Error::new(
                        other.span(),
                        "unknown key; expected 'name' | 'proto'",
                    ));
                }
            }
        }

        Ok(cfg)
    }
}
