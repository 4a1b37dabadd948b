use proc_macro::TokenStream;
use quote::quote;
use syn::*;

/// Derives `rustgrid::meta_data::Record` for a `#[repr(C)]` struct with named fields.
///
/// Every field becomes one attribute of the record schema, in declaration order.
/// The attribute name defaults to the field name and can be overridden with
/// `#[record(rename = "...")]`, which is how keyword-named attributes such as
/// `type` are spelled.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_record(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_record(input: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    if !has_repr_c(&input.attrs) {
        return Err(Error::new_spanned(
            name,
            "Record can only be derived for #[repr(C)] structs",
        ));
    }
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(Error::new_spanned(
                    name,
                    "Record can only be derived for named struct",
                ));
            }
        },
        _ => return Err(Error::new_spanned(name, "Record only supports structs")),
    };

    let mut descriptors = Vec::new();
    let mut getters = Vec::new();
    let mut setters = Vec::new();
    let mut missing = Vec::new();
    for (idx, f) in fields.iter().enumerate() {
        let fname = f.ident.as_ref().expect("named field");
        let ty = &f.ty;
        let attr_name = match rename_of(f)? {
            Some(renamed) => renamed,
            None => fname.to_string().trim_start_matches("r#").to_string(),
        };

        descriptors.push(quote! {
            ::rustgrid::meta_data::FieldDescriptor {
                name: #attr_name,
                ctype: <#ty as ::rustgrid::meta_data::AttributeType>::CTYPE,
                offset: ::core::mem::offset_of!(Self, #fname),
            }
        });
        getters.push(quote! {
            #idx => ::rustgrid::meta_data::AttributeType::into_value(self.#fname)
        });
        setters.push(quote! {
            #idx => {
                if let Some(v) = <#ty as ::rustgrid::meta_data::AttributeType>::from_value(value) {
                    self.#fname = v;
                }
            }
        });
        missing.push(quote! {
            #fname: <#ty as ::rustgrid::meta_data::AttributeType>::MISSING
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::rustgrid::meta_data::Record for #name #ty_generics #where_clause {
            const FIELDS: &'static [::rustgrid::meta_data::FieldDescriptor] = &[
                #(#descriptors),*
            ];

            fn get(&self, field: usize) -> ::rustgrid::meta_data::AttributeValue {
                match field {
                    #(#getters,)*
                    _ => panic!("field index {} out of range for {}", field, stringify!(#name)),
                }
            }

            fn set(&mut self, field: usize, value: ::rustgrid::meta_data::AttributeValue) {
                match field {
                    #(#setters)*
                    _ => panic!("field index {} out of range for {}", field, stringify!(#name)),
                }
            }

            fn missing() -> Self {
                Self {
                    #(#missing),*
                }
            }
        }
    })
}

fn has_repr_c(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        if !attr.path().is_ident("repr") {
            return false;
        }
        let mut found = false;
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("C") {
                found = true;
            }
            Ok(())
        });
        found
    })
}

fn rename_of(field: &Field) -> Result<Option<String>> {
    let mut renamed = None;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("record")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                renamed = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unsupported record attribute"))
            }
        })?;
    }
    Ok(renamed)
}
