use proc_macro2::Span;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{Error, Result};

/// A comma-separated list of named options, e.g. `linked, key = name`.
pub(crate) struct Attr<T> {
    pub(crate) items: Vec<Named<T>>,
}

impl<T> Default for Attr<T> {
    fn default() -> Self { Self { items: Vec::new() } }
}

impl<T> Parse for Attr<T>
where
    Named<T>: Parse,
{
    fn parse(input: ParseStream) -> Result<Self> {
        let items = Punctuated::<Named<T>, syn::Token![,]>::parse_terminated(input)?;
        Ok(Self { items: items.into_iter().collect() })
    }
}

impl<T> Attr<T> {
    /// Finds the only option accepted by `matcher`.
    ///
    /// Returns an error pointing at the second occurrence if the option is repeated.
    pub(crate) fn find_one<U>(
        &self,
        matcher: impl Fn(&T) -> Option<&U>,
    ) -> Result<Option<(Span, &U)>> {
        let mut found = None;

        for item in &self.items {
            if let Some(value) = matcher(&item.value) {
                if found.is_some() {
                    return Err(Error::new(
                        item.name.span(),
                        format!("Argument `{}` is specified multiple times", item.name),
                    ));
                }
                found = Some((item.name.span(), value));
            }
        }

        Ok(found)
    }

    /// Whether any option is accepted by `matcher`.
    pub(crate) fn any(&self, matcher: impl Fn(&T) -> bool) -> bool {
        self.items.iter().any(|item| matcher(&item.value))
    }
}

/// An option value together with the identifier that introduced it.
pub(crate) struct Named<T> {
    pub(crate) name:  syn::Ident,
    pub(crate) value: T,
}
