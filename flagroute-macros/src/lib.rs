use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr, Meta, Visibility};

/// Derives `flagroute::Options` for a struct with named fields.
///
/// # Usage
///
/// ```ignore
/// #[derive(Default, Clone, Options)]
/// pub struct Build {
///     #[flag(short = "j", long = "jobs", dft = "4", desc = "parallel jobs")]
///     pub jobs: u32,
///
///     #[flag(long = "env", dft = "a=1;b=2", sep = ";=")]
///     pub env: HashMap<String, String>,
///
///     pub scratch: String,
/// }
/// ```
///
/// Every attribute value is a string literal kept verbatim; it is validated
/// when the struct is bound. Fields that are not `pub` or carry no `#[flag]`
/// attribute are described as inert and never bound.
///
/// This will generate:
///
/// ```ignore
/// impl flagroute::Options for Build {
///     fn fields() -> Vec<flagroute::Field<Self>> {
///         vec![
///             flagroute::Field::bound("jobs", flagroute::FieldTags { short: Some("j"), .. }, flagroute::Access { .. }),
///             flagroute::Field::bound("env", ..),
///             flagroute::Field::inert("scratch"),
///         ]
///     }
/// }
/// ```
#[proc_macro_derive(Options, attributes(flag))]
pub fn derive_options(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Options can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Options can only be derived for structs",
            ))
        }
    };

    let entries = fields
        .iter()
        .map(field_entry)
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        impl #impl_generics ::flagroute::Options for #name #ty_generics #where_clause {
            fn fields() -> ::std::vec::Vec<::flagroute::Field<Self>> {
                ::std::vec![#(#entries),*]
            }
        }
    })
}

fn field_entry(field: &syn::Field) -> syn::Result<TokenStream2> {
    let Some(ident) = &field.ident else {
        return Err(syn::Error::new_spanned(field, "expected a named field"));
    };
    let name = ident.to_string();
    let name = name.trim_start_matches("r#");
    let tags = flag_attr(&field.attrs)?;

    let tags = match tags {
        Some(tags) if matches!(field.vis, Visibility::Public(_)) => tags,
        _ => return Ok(quote! { ::flagroute::Field::inert(#name) }),
    };

    let ty = &field.ty;
    let short = optional(&tags.short);
    let long = optional(&tags.long);
    let dft = optional(&tags.dft);
    let desc = optional(&tags.desc);
    let sep = optional(&tags.sep);

    Ok(quote! {
        ::flagroute::Field::bound(
            #name,
            ::flagroute::FieldTags {
                short: #short,
                long: #long,
                dft: #dft,
                desc: #desc,
                sep: #sep,
            },
            ::flagroute::Access {
                describe: <#ty as ::flagroute::Flag>::describe,
                assign: |target: &mut Self, value: ::flagroute::Value| -> ::flagroute::Result<()> {
                    target.#ident = <#ty as ::flagroute::Flag>::from_value(value)?;
                    ::std::result::Result::Ok(())
                },
                address: |target: &Self| -> *const () {
                    ::std::ptr::addr_of!(target.#ident).cast::<()>()
                },
            },
        )
    })
}

#[derive(Default)]
struct FlagAttr {
    short: Option<LitStr>,
    long: Option<LitStr>,
    dft: Option<LitStr>,
    desc: Option<LitStr>,
    sep: Option<LitStr>,
}

/// Extract `#[flag(key = "value", ...)]`. A bare `#[flag]` yields empty tags.
fn flag_attr(attrs: &[Attribute]) -> syn::Result<Option<FlagAttr>> {
    let mut found = None;
    for attr in attrs {
        if !attr.path().is_ident("flag") {
            continue;
        }
        if found.is_some() {
            return Err(syn::Error::new_spanned(attr, "duplicate #[flag] attribute"));
        }

        let mut tags = FlagAttr::default();
        if !matches!(attr.meta, Meta::Path(_)) {
            attr.parse_nested_meta(|meta| {
                let slot = if meta.path.is_ident("short") {
                    &mut tags.short
                } else if meta.path.is_ident("long") {
                    &mut tags.long
                } else if meta.path.is_ident("dft") {
                    &mut tags.dft
                } else if meta.path.is_ident("desc") {
                    &mut tags.desc
                } else if meta.path.is_ident("sep") {
                    &mut tags.sep
                } else {
                    return Err(meta.error("unknown flag key, expected short, long, dft, desc or sep"));
                };
                if slot.is_some() {
                    return Err(meta.error("flag key given twice"));
                }
                *slot = Some(meta.value()?.parse()?);
                Ok(())
            })?;
        }
        found = Some(tags);
    }
    Ok(found)
}

fn optional(lit: &Option<LitStr>) -> TokenStream2 {
    match lit {
        Some(lit) => quote! { ::std::option::Option::Some(#lit) },
        None => quote! { ::std::option::Option::None },
    }
}
