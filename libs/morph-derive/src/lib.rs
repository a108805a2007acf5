use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Path};

/// Derive macro for the reflection facade.
///
/// On a struct with named fields it generates the `Reflect` impl plus a
/// lazily-built static `TypeSchema` (`ReflectSchema`). Field shapes are
/// declared with `#[reflect(...)]` attributes rather than guessed from
/// type names:
///
/// - no attribute: plain value leaf (the field type implements
///   `PropertyValue`; `Option<T>` of a leaf is the optional form)
/// - `#[reflect(object)]`: nested `Reflect` object, mapped in place
/// - `#[reflect(shared)]`: `Option<Rc<RefCell<T>>>` shared handle
/// - `#[reflect(objects)]`: `Vec<T>` collection of nested objects
/// - `#[reflect(enumeration)]`: fieldless enum carried by variant name
/// - `#[reflect(opaque)]`: custom scalar only custom converters understand
/// - `#[reflect(read_only)]`: no write accessor
/// - `#[reflect(skip)]`: not exposed at all
///
/// A struct-level `#[reflect(extends(Base))]` adds facet tags consulted by
/// `Inherit` type filters.
///
/// On a fieldless enum the same derive generates the `EnumProperty` impl
/// used by `enumeration` fields.
///
/// # Example
///
/// ```ignore
/// #[derive(Reflect, Default)]
/// struct Order {
///     id: i64,
///     note: Option<String>,
///     #[reflect(objects)]
///     lines: Vec<OrderLine>,
/// }
/// ```
#[proc_macro_derive(Reflect, attributes(reflect))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum FieldMode {
    Value,
    Object,
    Shared,
    Objects,
    Enumeration,
    Opaque,
    Skip,
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Reflect does not support generic types",
        ));
    }
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => derive_struct(input, &fields.named),
            _ => Err(syn::Error::new_spanned(
                &input.ident,
                "Reflect only supports structs with named fields",
            )),
        },
        Data::Enum(data) => derive_enum(input, data),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &input.ident,
            "Reflect does not support unions",
        )),
    }
}

fn derive_struct(
    input: &DeriveInput,
    fields: &syn::punctuated::Punctuated<syn::Field, syn::Token![,]>,
) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;
    let name_str = name.to_string();
    let extends = parse_extends(input)?;

    let mut descriptor_tokens = Vec::new();
    let mut read_arms = Vec::new();
    let mut write_arms = Vec::new();
    let mut reach_arms = Vec::new();

    for field in fields {
        let ident = field.ident.as_ref().ok_or_else(|| {
            syn::Error::new_spanned(field, "expected named field")
        })?;
        let field_str = ident.to_string();
        let ty = &field.ty;

        let (mode, read_only) = parse_field_attrs(field)?;
        if mode == FieldMode::Skip {
            continue;
        }

        let descriptor = match mode {
            FieldMode::Value => quote! {
                <#ty as ::morph_api::property::PropertyValue>::descriptor(#field_str)
            },
            FieldMode::Enumeration => quote! {
                <#ty as ::morph_api::property::EnumProperty>::descriptor(#field_str)
            },
            FieldMode::Opaque => quote! {
                <#ty as ::morph_api::property::OpaqueProperty>::descriptor(#field_str)
            },
            FieldMode::Object => quote! {
                ::morph_api::descriptor::PropertyDescriptor::object(
                    #field_str,
                    ::morph_api::descriptor::short_type_name::<#ty>(),
                )
            },
            FieldMode::Shared => quote! {
                <#ty as ::morph_api::property::SharedObjectProperty>::descriptor(#field_str)
            },
            FieldMode::Objects => quote! {
                <#ty as ::morph_api::property::SeqProperty>::descriptor(#field_str)
            },
            FieldMode::Skip => unreachable!(),
        };
        if read_only {
            descriptor_tokens.push(quote! { #descriptor.read_only() });
        } else {
            descriptor_tokens.push(descriptor);
        }

        match mode {
            FieldMode::Value => {
                read_arms.push(quote! {
                    #field_str => ::morph_api::property::PropertyValue::load(&self.#ident),
                });
                if !read_only {
                    write_arms.push(quote! {
                        #field_str => ::morph_api::property::PropertyValue::store(&mut self.#ident, value),
                    });
                }
            }
            FieldMode::Enumeration => {
                read_arms.push(quote! {
                    #field_str => ::morph_api::property::EnumProperty::load(&self.#ident),
                });
                if !read_only {
                    write_arms.push(quote! {
                        #field_str => ::morph_api::property::EnumProperty::store(&mut self.#ident, value),
                    });
                }
            }
            FieldMode::Opaque => {
                read_arms.push(quote! {
                    #field_str => ::morph_api::property::OpaqueProperty::load(&self.#ident),
                });
                if !read_only {
                    write_arms.push(quote! {
                        #field_str => ::morph_api::property::OpaqueProperty::store(&mut self.#ident, value),
                    });
                }
            }
            FieldMode::Object => {
                read_arms.push(quote! {
                    #field_str => ::morph_api::object::Slot::Object(
                        ::morph_api::object::ObjRef::Inline(&self.#ident),
                    ),
                });
                reach_arms.push(quote! {
                    #field_str => ::morph_api::object::Reach::Object(
                        ::morph_api::object::ObjMut::Inline(&mut self.#ident),
                    ),
                });
            }
            FieldMode::Shared => {
                read_arms.push(quote! {
                    #field_str => ::morph_api::property::SharedObjectProperty::load(&self.#ident),
                });
                reach_arms.push(quote! {
                    #field_str => ::morph_api::property::SharedObjectProperty::reach(&mut self.#ident),
                });
            }
            FieldMode::Objects => {
                read_arms.push(quote! {
                    #field_str => ::morph_api::property::SeqProperty::load(&self.#ident),
                });
                reach_arms.push(quote! {
                    #field_str => ::morph_api::property::SeqProperty::reach(&mut self.#ident),
                });
            }
            FieldMode::Skip => unreachable!(),
        }
    }

    let schema_init = if extends.is_empty() {
        quote! {
            ::morph_api::descriptor::TypeSchema::of::<#name>(
                #name_str,
                vec![#(#descriptor_tokens),*],
            )
        }
    } else {
        let facets: Vec<TokenStream2> = extends
            .iter()
            .map(|base| quote! { schema = schema.with_facet::<#base>(); })
            .collect();
        quote! {
            {
                let mut schema = ::morph_api::descriptor::TypeSchema::of::<#name>(
                    #name_str,
                    vec![#(#descriptor_tokens),*],
                );
                #(#facets)*
                schema
            }
        }
    };

    let value_param = if write_arms.is_empty() {
        quote! { _value }
    } else {
        quote! { value }
    };

    Ok(quote! {
        impl ::morph_api::object::Reflect for #name {
            fn schema(&self) -> &::morph_api::descriptor::TypeSchema {
                <Self as ::morph_api::object::ReflectSchema>::type_schema()
            }

            fn read(&self, name: &str) -> ::morph_api::object::Slot<'_> {
                match name {
                    #(#read_arms)*
                    _ => ::morph_api::object::Slot::Missing,
                }
            }

            fn write(&mut self, name: &str, #value_param: ::morph_api::value::Value) -> bool {
                match name {
                    #(#write_arms)*
                    _ => false,
                }
            }

            fn reach(&mut self, name: &str) -> ::morph_api::object::Reach<'_> {
                match name {
                    #(#reach_arms)*
                    _ => ::morph_api::object::Reach::None,
                }
            }
        }

        impl ::morph_api::object::ReflectSchema for #name {
            fn type_schema() -> &'static ::morph_api::descriptor::TypeSchema {
                static SCHEMA: ::std::sync::LazyLock<::morph_api::descriptor::TypeSchema> =
                    ::std::sync::LazyLock::new(|| #schema_init);
                &SCHEMA
            }
        }
    })
}

fn derive_enum(input: &DeriveInput, data: &syn::DataEnum) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;

    let mut variant_names = Vec::new();
    let mut name_arms = Vec::new();
    let mut parse_arms = Vec::new();

    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Reflect enums must be fieldless",
            ));
        }
        let ident = &variant.ident;
        let ident_str = ident.to_string();
        variant_names.push(quote! { #ident_str });
        name_arms.push(quote! { #name::#ident => #ident_str, });
        parse_arms.push(quote! {
            if name.eq_ignore_ascii_case(#ident_str) {
                return Some(#name::#ident);
            }
        });
    }

    Ok(quote! {
        impl ::morph_api::property::EnumProperty for #name {
            const VARIANTS: &'static [&'static str] = &[#(#variant_names),*];

            fn variant_name(&self) -> &'static str {
                match self {
                    #(#name_arms)*
                }
            }

            fn from_variant_name(name: &str) -> Option<Self> {
                #(#parse_arms)*
                None
            }
        }
    })
}

/// Parse the field-level `#[reflect(...)]` attribute.
fn parse_field_attrs(field: &syn::Field) -> Result<(FieldMode, bool), syn::Error> {
    let mut mode = FieldMode::Value;
    let mut read_only = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("reflect") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("object") {
                mode = FieldMode::Object;
            } else if meta.path.is_ident("shared") {
                mode = FieldMode::Shared;
            } else if meta.path.is_ident("objects") {
                mode = FieldMode::Objects;
            } else if meta.path.is_ident("enumeration") {
                mode = FieldMode::Enumeration;
            } else if meta.path.is_ident("opaque") {
                mode = FieldMode::Opaque;
            } else if meta.path.is_ident("skip") {
                mode = FieldMode::Skip;
            } else if meta.path.is_ident("read_only") {
                read_only = true;
            } else {
                return Err(meta.error("unknown reflect attribute"));
            }
            Ok(())
        })?;
    }

    Ok((mode, read_only))
}

/// Parse the struct-level `#[reflect(extends(Base, ...))]` attribute.
fn parse_extends(input: &DeriveInput) -> Result<Vec<Path>, syn::Error> {
    let mut bases = Vec::new();

    for attr in &input.attrs {
        if !attr.path().is_ident("reflect") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("extends") {
                meta.parse_nested_meta(|inner| {
                    bases.push(inner.path.clone());
                    Ok(())
                })
            } else {
                Err(meta.error("unknown reflect attribute"))
            }
        })?;
    }

    Ok(bases)
}
