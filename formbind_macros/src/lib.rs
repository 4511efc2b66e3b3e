use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type,
    Visibility,
};

const SCALARS: &[&str] = &[
    "String", "bool", "i8", "i16", "i32", "i64", "isize", "u8", "u16", "u32", "u64", "usize",
    "f32", "f64", "Duration", "DateTime",
];

#[derive(Default)]
struct BindAttrs {
    tags: Vec<(&'static str, LitStr)>,
    embed: bool,
    skip: bool,
    scalar: bool,
}

impl BindAttrs {
    /// Tags that only a writable field can honour.
    fn needs_slot(&self) -> bool {
        self.tags
            .iter()
            .any(|(tag, _)| matches!(*tag, "path" | "query" | "form" | "header" | "default"))
    }

    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut out = BindAttrs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("bind")) {
            attr.parse_nested_meta(|meta| {
                let tag = if meta.path.is_ident("path") {
                    "path"
                } else if meta.path.is_ident("query") {
                    "query"
                } else if meta.path.is_ident("form") {
                    "form"
                } else if meta.path.is_ident("header") {
                    "header"
                } else if meta.path.is_ident("body") {
                    "body"
                } else if meta.path.is_ident("default") {
                    "default"
                } else if meta.path.is_ident("validate") {
                    "validate"
                } else if meta.path.is_ident("embed") {
                    out.embed = true;
                    return Ok(());
                } else if meta.path.is_ident("skip") {
                    out.skip = true;
                    return Ok(());
                } else if meta.path.is_ident("scalar") {
                    out.scalar = true;
                    return Ok(());
                } else {
                    return Err(meta.error("unsupported bind attribute"));
                };
                let value: LitStr = meta.value()?.parse()?;
                out.tags.push((tag, value));
                Ok(())
            })?;
        }
        Ok(out)
    }
}

/// Single generic argument of `Outer<T>` when the last path segment is `outer`.
fn unwrap_generic<'a>(ty: &'a Type, outer: &str) -> Option<&'a Type> {
    let Type::Path(p) = ty else { return None };
    let seg = p.path.segments.last()?;
    if seg.ident != outer {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

enum Scalarity {
    Scalar,
    /// Named like a scalar but not the type the coercer produces, such as
    /// `chrono::Duration` or `DateTime<FixedOffset>`.
    Lookalike,
    Other,
}

fn is_utc(seg: &syn::PathSegment) -> bool {
    let PathArguments::AngleBracketed(args) = &seg.arguments else {
        return false;
    };
    match args.args.first() {
        Some(GenericArgument::Type(Type::Path(tz))) => {
            tz.path.segments.last().is_some_and(|s| s.ident == "Utc")
        }
        _ => false,
    }
}

fn scalarity(ty: &Type) -> Scalarity {
    let Type::Path(p) = ty else {
        return Scalarity::Other;
    };
    let Some(last) = p.path.segments.last() else {
        return Scalarity::Other;
    };
    if p.qself.is_some() || !SCALARS.iter().any(|s| last.ident == *s) {
        return Scalarity::Other;
    }
    let prefix: Vec<String> = p
        .path
        .segments
        .iter()
        .take(p.path.segments.len() - 1)
        .map(|seg| seg.ident.to_string())
        .collect();
    let recognized = if last.ident == "Duration" {
        match prefix.as_slice() {
            [] => true,
            [root, module] => (root == "std" || root == "core") && module == "time",
            _ => false,
        }
    } else if last.ident == "DateTime" {
        let crate_ok = match prefix.as_slice() {
            [] => true,
            [root] => root == "chrono",
            _ => false,
        };
        crate_ok && is_utc(last)
    } else {
        prefix
            .first()
            .map_or(true, |root| root == "std" || root == "core" || root == "alloc")
    };
    if recognized {
        Scalarity::Scalar
    } else {
        Scalarity::Lookalike
    }
}

/// Scalar, `Option<scalar>` or `Vec<scalar>`.
fn bindable(ty: &Type) -> Scalarity {
    let inner = unwrap_generic(ty, "Option")
        .or_else(|| unwrap_generic(ty, "Vec"))
        .unwrap_or(ty);
    scalarity(inner)
}

enum Holder {
    Plain,
    Boxed,
    Optional,
    OptionalBoxed,
}

fn embedded_holder(ty: &Type) -> (Holder, &Type) {
    if let Some(inner) = unwrap_generic(ty, "Option") {
        match unwrap_generic(inner, "Box") {
            Some(record) => (Holder::OptionalBoxed, record),
            None => (Holder::Optional, inner),
        }
    } else if let Some(record) = unwrap_generic(ty, "Box") {
        (Holder::Boxed, record)
    } else {
        (Holder::Plain, ty)
    }
}

/// Derive `formbind::Record` from `#[bind(...)]` field attributes.
///
/// Keys: `path`, `query` (alias `form`), `header`, `body`, `default`,
/// `validate`, plus the flags `embed`, `skip` and `scalar` (treat a type the
/// macro does not recognize, such as an alias, as a bindable scalar).
/// Fields without `pub` are never bound and are reset after the body stage.
#[proc_macro_derive(Record, attributes(bind))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(e) => TokenStream::from(e.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Record can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Record requires named fields",
        ));
    };

    let mut describe = Vec::new();
    let mut clear = Vec::new();

    for field in &fields.named {
        let Some(ident) = &field.ident else { continue };
        let ty = &field.ty;
        let attrs = BindAttrs::parse(&field.attrs)?;
        let name = ident.to_string().trim_start_matches("r#").to_string();

        if !matches!(field.vis, Visibility::Public(_)) {
            clear.push(quote! { self.#ident = ::core::default::Default::default(); });
            continue;
        }
        if attrs.skip {
            continue;
        }

        if attrs.embed {
            let (holder, record) = embedded_holder(ty);
            describe.push(quote! {
                shape.embed::<#record, #ty>(#name, |r| &mut r.#ident);
            });
            let inner = format_ident!("inner");
            clear.push(match holder {
                Holder::Plain => quote! { ::formbind::Record::clear_hidden(&mut self.#ident); },
                Holder::Boxed => quote! { ::formbind::Record::clear_hidden(&mut *self.#ident); },
                Holder::Optional => quote! {
                    if let ::core::option::Option::Some(#inner) = self.#ident.as_mut() {
                        ::formbind::Record::clear_hidden(#inner);
                    }
                },
                Holder::OptionalBoxed => quote! {
                    if let ::core::option::Option::Some(#inner) = self.#ident.as_mut() {
                        ::formbind::Record::clear_hidden(&mut **#inner);
                    }
                },
            });
            continue;
        }

        let tags = attrs.tags.iter().map(|(tag, value)| {
            let method = format_ident!("{}", tag);
            quote! { .#method(#value) }
        });
        let bound = attrs.scalar || matches!(bindable(ty), Scalarity::Scalar);
        if !bound && matches!(bindable(ty), Scalarity::Lookalike) && attrs.needs_slot() {
            return Err(syn::Error::new_spanned(
                ty,
                format!(
                    "field `{name}`: this type cannot be coerced from a source string; \
                     use std::time::Duration or chrono::DateTime<Utc>, \
                     or add #[bind(scalar)] if it is an alias of one"
                ),
            ));
        }
        if bound {
            describe.push(quote! {
                shape.field::<#ty>(#name, |r| &mut r.#ident) #(#tags)*;
            });
        } else {
            describe.push(quote! {
                shape.opaque::<#ty>(#name) #(#tags)*;
            });
        }
    }

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::formbind::Record for #ident #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn describe(shape: &mut ::formbind::shape::ShapeBuilder<Self>) {
                #(#describe)*
            }

            fn clear_hidden(&mut self) {
                #(#clear)*
            }
        }
    })
}
