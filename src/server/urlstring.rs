use std::fmt::{Display, Write};

/// A url being built, one query parameter at a time.
#[derive(Clone, Debug)]
pub struct UrlString {
    value: String,
    has_query: bool,
}

impl UrlString {
    pub fn new(base: &str) -> Self {
        UrlString {
            value: base.into(),
            has_query: base.contains('?'),
        }
    }

    pub fn query<T: Display>(&mut self, name: &str, val: T) {
        self.separate();
        self.value
            .write_fmt(format_args!("{name}={val}"))
            .expect("a Display implementation returned an error unexpectedly");
    }

    fn separate(&mut self) {
        self.value.push(if self.has_query { '&' } else { '?' });
        self.has_query = true;
    }
}

impl From<UrlString> for String {
    fn from(url: UrlString) -> String {
        url.value
    }
}

impl AsRef<str> for UrlString {
    fn as_ref(&self) -> &str {
        &self.value
    }
}
