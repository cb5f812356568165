use matches2::option_match;
use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Error, Result};

use crate::util::{Attr, Named};

pub(crate) fn derive(input: TokenStream) -> Result<TokenStream> {
    let input: syn::DeriveInput = syn::parse2(input)?;

    let mut args: Attr<ItemOpt> = Attr::default();
    for attr in &input.attrs {
        if attr.path().is_ident("component") {
            let this_args: Attr<ItemOpt> = attr.parse_args()?;
            args.items.extend(this_args.items);
        }
    }

    let crate_name = args
        .find_one(|opt| option_match!(opt, ItemOpt::ReflexAs(_, crate_name) => crate_name))?
        .map_or_else(|| quote!(::reflex), |(_, crate_name)| crate_name.clone());

    let linked = args.any(|opt| matches!(opt, ItemOpt::Linked));

    let ancestors: Vec<&syn::Type> = args
        .items
        .iter()
        .filter_map(|item| option_match!(&item.value, ItemOpt::Extends(_, types) => types))
        .flatten()
        .collect();

    let key_fn = match args.find_one(|opt| option_match!(opt, ItemOpt::Key(_, member) => member))? {
        Some((span, member)) => {
            if !matches!(input.data, syn::Data::Struct(_)) {
                return Err(Error::new(span, "`key` can only be used on structs"));
            }
            Some(quote! {
                fn key(&self) -> ::core::option::Option<&str> {
                    let key = ::core::convert::AsRef::<str>::as_ref(&self.#member);
                    ::core::option::Option::Some(key)
                }
            })
        }
        None => None,
    };

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let type_desc = quote!(#crate_name::comp::TypeDesc);

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics #crate_name::Component for #ident #ty_generics #where_clause {
            const LINKED: bool = #linked;

            const ANCESTORS: &'static [fn() -> #type_desc] = &[
                #(
                    #type_desc::of::<#ancestors> as fn() -> #type_desc,
                )*
            ];

            #key_fn
        }
    })
}

enum ItemOpt {
    ReflexAs(syn::token::Paren, TokenStream),
    Linked,
    Extends(syn::token::Paren, Punctuated<syn::Type, syn::Token![,]>),
    Key(syn::Token![=], syn::Member),
}

impl Parse for Named<ItemOpt> {
    fn parse(input: ParseStream) -> Result<Self> {
        let name = input.parse::<syn::Ident>()?;

        let value = match name.to_string().as_str() {
            "reflex_as" => {
                let inner;
                let paren = syn::parenthesized!(inner in input);
                let args = inner.parse()?;
                ItemOpt::ReflexAs(paren, args)
            }
            "linked" => ItemOpt::Linked,
            "extends" => {
                let inner;
                let paren = syn::parenthesized!(inner in input);
                let types = Punctuated::parse_terminated(&inner)?;
                ItemOpt::Extends(paren, types)
            }
            "key" => {
                let eq: syn::Token![=] = input.parse()?;
                let member: syn::Member = input.parse()?;
                ItemOpt::Key(eq, member)
            }
            _ => return Err(Error::new_spanned(&name, format!("Unknown argument `{}`", name))),
        };

        Ok(Named { name, value })
    }
}
