use std::fmt;

/// Holds a vendor API key or token without letting it leak through `Debug` or `Display`. Both render a fixed
/// placeholder; code that genuinely needs the value calls [`Secret::reveal`] at the point of use.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn reveal(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formatting_never_exposes_the_value() {
        let key = Secret::new("sk-very-private".to_string());
        assert_eq!(format!("{key}"), "<redacted>");
        assert_eq!(format!("{key:?}"), "<redacted>");
        assert_eq!(key.reveal(), "sk-very-private");
        assert_eq!(key.into_inner(), "sk-very-private");
    }
}
