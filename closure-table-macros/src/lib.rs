use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{parse_macro_input, spanned::Spanned, Attribute, Data, DeriveInput, Fields, Ident, Type};

#[proc_macro_derive(ClosureTreeModel, attributes(closure_tree))]
pub fn derive_closure_tree_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_closure_tree_model(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct Options {
    id_field: Option<String>,
    id_type: Option<Type>,
    entity_name: Option<String>,
    closure_table: Option<syn::LitStr>,
    child_attribute: Option<syn::LitStr>,
    parent_attribute: Option<syn::LitStr>,
    depth_attribute: Option<syn::LitStr>,
    leaf_parameter: Option<syn::LitStr>,
}

fn impl_closure_tree_model(input: &DeriveInput) -> syn::Result<TokenStream> {
    let struct_ident = &input.ident;

    let data_struct = match &input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                input.span(),
                "ClosureTreeModel can only be derived for structs",
            ))
        }
    };

    let mut options = Options::default();
    for attr in &input.attrs {
        if attr.path().is_ident("closure_tree") {
            parse_closure_tree_attr(attr, &mut options)?;
        }
    }

    let id_field_name = options.id_field.unwrap_or_else(|| "id".to_string());
    let id_field_ident = Ident::new(&id_field_name, struct_ident.span());

    let mut id_field_type: Option<Type> = options.id_type.clone();
    if let Fields::Named(ref fields) = data_struct.fields {
        for field in &fields.named {
            if let Some(ident) = &field.ident {
                if ident == &id_field_ident && id_field_type.is_none() {
                    id_field_type = Some(field.ty.clone());
                }
            }
        }
    } else {
        return Err(syn::Error::new(
            data_struct.fields.span(),
            "ClosureTreeModel requires named fields",
        ));
    }

    let id_type = id_field_type.ok_or_else(|| {
        syn::Error::new(
            struct_ident.span(),
            "Unable to determine id field type; specify `id_type = ...` in #[closure_tree]",
        )
    })?;

    let closure_table = options
        .closure_table
        .ok_or_else(|| syn::Error::new(struct_ident.span(), "`closure_table` must be set"))?;

    let entity_name = options
        .entity_name
        .unwrap_or_else(|| struct_ident.unraw().to_string());
    let entity_name_literal = syn::LitStr::new(&entity_name, struct_ident.span());
    let id_column_variant = format_ident!("{}", to_pascal_case(&id_field_name));

    let overrides = [
        (format_ident!("child_attribute"), options.child_attribute),
        (format_ident!("parent_attribute"), options.parent_attribute),
        (format_ident!("depth_attribute"), options.depth_attribute),
        (format_ident!("leaf_parameter"), options.leaf_parameter),
    ]
    .into_iter()
    .filter_map(|(setter, value)| value.map(|value| quote! { .#setter(#value) }))
    .collect::<Vec<_>>();

    let generated = quote! {
        impl ::closure_table::ClosureTreeModel for #struct_ident {
            type Entity = Entity;
            type ActiveModel = ActiveModel;
            type Id = #id_type;

            fn closure_tree_config() -> &'static ::closure_table::ClosureTreeConfig {
                static CONFIG: ::closure_table::__private::once_cell::sync::Lazy<
                    ::closure_table::ClosureTreeConfig,
                > = ::closure_table::__private::once_cell::sync::Lazy::new(|| {
                    let base = ::closure_table::ClosureTreeConfig::new(
                        #entity_name_literal,
                        #closure_table,
                    );
                    ::closure_table::ClosureTreeOptions::default()
                        #(#overrides)*
                        .apply(base)
                });
                &CONFIG
            }

            fn id(&self) -> Self::Id {
                self.#id_field_ident.clone()
            }

            fn id_to_value(id: &Self::Id) -> ::sea_orm::Value {
                ::sea_orm::Value::from(id.clone())
            }

            fn id_column() -> <Self::Entity as ::sea_orm::EntityTrait>::Column {
                Column::#id_column_variant
            }
        }
    };

    Ok(generated.into())
}

fn parse_closure_tree_attr(attr: &Attribute, options: &mut Options) -> syn::Result<()> {
    attr.parse_nested_meta(|meta| {
        let ident = meta
            .path
            .get_ident()
            .ok_or_else(|| syn::Error::new(meta.path.span(), "Invalid option key"))?
            .to_string();

        match ident.as_str() {
            "id_field" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.id_field = Some(value.value());
            }
            "id_type" => {
                let ty: Type = meta.value()?.parse()?;
                options.id_type = Some(ty);
            }
            "entity_name" => {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.entity_name = Some(value.value());
            }
            "closure_table" => options.closure_table = Some(parse_identifier(&meta)?),
            "child_attribute" => options.child_attribute = Some(parse_identifier(&meta)?),
            "parent_attribute" => options.parent_attribute = Some(parse_identifier(&meta)?),
            "depth_attribute" => options.depth_attribute = Some(parse_identifier(&meta)?),
            "leaf_parameter" => options.leaf_parameter = Some(parse_identifier(&meta)?),
            other => {
                return Err(syn::Error::new(
                    meta.path.span(),
                    format!("Unsupported closure_tree option `{other}`"),
                ));
            }
        }

        Ok(())
    })
}

/// Table and column names end up in generated SQL; only accept plain identifiers.
fn parse_identifier(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<syn::LitStr> {
    let value: syn::LitStr = meta.value()?.parse()?;
    if is_identifier(&value.value()) {
        Ok(value)
    } else {
        Err(syn::Error::new(
            value.span(),
            "expected an identifier made of ASCII letters, digits and underscores",
        ))
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn to_pascal_case(value: &str) -> String {
    value
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_accept_plain_sql_names_only() {
        assert!(is_identifier("folder_tree"));
        assert!(is_identifier("_depth2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2nd"));
        assert!(!is_identifier("tree; DROP TABLE folders"));
        assert!(!is_identifier("public.tree"));
    }

    #[test]
    fn field_names_map_to_column_variants() {
        assert_eq!(to_pascal_case("id"), "Id");
        assert_eq!(to_pascal_case("folder_id"), "FolderId");
        assert_eq!(to_pascal_case("__legacy__key"), "LegacyKey");
    }
}
