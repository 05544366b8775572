//! Itemization strategy: raw backend record -> canonical item.
//!
//! A normalizer is a value bound into a collection at construction. Any lookup
//! tables it needs are handed to it up front, so `itemize` stays a pure
//! function of (record, tables). It must not perform IO.

use invrec_schemas::CanonicalItem;

use crate::error::NormalizationError;

pub trait Normalizer: Send + Sync {
    type Record;

    /// Build the complete canonical item for `record`, or fail.
    fn itemize(&self, record: &Self::Record) -> Result<CanonicalItem, NormalizationError>;
}

/// Adapter turning a plain function into a [`Normalizer`].
///
/// Handy for tests and one-off record types.
pub struct FnNormalizer<R, F> {
    f: F,
    _record: std::marker::PhantomData<fn(&R)>,
}

impl<R, F> FnNormalizer<R, F>
where
    F: Fn(&R) -> Result<CanonicalItem, NormalizationError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _record: std::marker::PhantomData,
        }
    }
}

impl<R, F> Normalizer for FnNormalizer<R, F>
where
    F: Fn(&R) -> Result<CanonicalItem, NormalizationError> + Send + Sync,
{
    type Record = R;

    fn itemize(&self, record: &R) -> Result<CanonicalItem, NormalizationError> {
        (self.f)(record)
    }
}

/// Canonical hostname form shared by device normalizers: trimmed, lower-case,
/// domain suffix removed.
pub fn normalize_hostname(name: &str) -> String {
    let name = name.trim();
    let short = name.split('.').next().unwrap_or(name);
    short.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_is_short_and_lowercase() {
        assert_eq!(normalize_hostname("SW-Core-01.corp.example.com"), "sw-core-01");
        assert_eq!(normalize_hostname("  edge1 "), "edge1");
        assert_eq!(normalize_hostname(""), "");
    }

    #[test]
    fn fn_normalizer_delegates() {
        let n = FnNormalizer::new(|name: &String| {
            if name.is_empty() {
                return Err(NormalizationError::MissingField("name".to_string()));
            }
            Ok(CanonicalItem::new().with("hostname", normalize_hostname(name)))
        });

        let item = n.itemize(&"Edge1.lab".to_string()).unwrap();
        assert_eq!(item.str_field("hostname"), Some("edge1"));
        assert!(n.itemize(&String::new()).is_err());
    }
}
