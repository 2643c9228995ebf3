//! Ext functions for falling back to a default string without a mapper closure at every call site.

/// Extension trait for converting `Option` values to `String` with a default value.
pub trait UnwrapToStringExt {
    fn unwrap_or_to_string(self, default: &str) -> String;
}

impl<T: ToString> UnwrapToStringExt for Option<T> {
    fn unwrap_or_to_string(self, default: &str) -> String {
        self.map_or_else(|| default.to_owned(), |t| t.to_string())
    }
}
