use crate::utils::{apply_derives, ensure_required_fields, has_field_named};
use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{
    Fields, Ident, Item, Result, Token, Type, parse::Parse, parse::ParseStream, parse_macro_input,
};

/// #[command] 宏实现
/// - 仅支持具名字段结构体
/// - 默认以 `id: String` 作为目标聚合 ID（缺失时补齐）
/// - `#[command(id = field)]` 指定其他字段作为聚合 ID，该字段须实现 `AsRef<str>`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as CommandAttrConfig);
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[command] only on struct")
                .to_compile_error()
                .into();
        }
    };

    let fields = match &mut st.fields {
        Fields::Named(f) => f,
        _ => {
            return syn::Error::new(st.span(), "only supports named-field struct")
                .to_compile_error()
                .into();
        }
    };

    let id_field = match cfg.id_field {
        Some(field) => {
            if !has_field_named(fields, &field.to_string()) {
                return syn::Error::new(field.span(), "no such field on this struct")
                    .to_compile_error()
                    .into();
            }
            field
        }
        None => {
            let id_ty: Type = syn::parse_quote! { String };
            ensure_required_fields(fields, &[("id", id_ty)]);
            syn::parse_quote! { id }
        }
    };

    apply_derives(
        &mut st.attrs,
        vec![syn::parse_quote!(Debug), syn::parse_quote!(Clone)],
    );

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    let expanded = quote! {
        #st

        impl #impl_generics ::es_domain::command::Command for #ident #ty_generics #where_clause {
            fn aggregate_id(&self) -> &str {
                ::core::convert::AsRef::<str>::as_ref(&self.#id_field)
            }
        }
    };

    TokenStream::from(expanded)
}

struct CommandAttrConfig {
    id_field: Option<Ident>,
}

impl Parse for CommandAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        if input.is_empty() {
            return Ok(Self { id_field: None });
        }

        let key: Ident = input.parse()?;
        if key != "id" {
            return Err(syn::Error::new(key.span(), "unknown key; expected 'id'"));
        }
        input.parse::<Token![=]>()?;
        let id_field: Ident = input.parse()?;
        if !input.is_empty() {
            return Err(input.error("unexpected tokens after 'id = field'"));
        }

        Ok(Self {
            id_field: Some(id_field),
        })
    }
}
