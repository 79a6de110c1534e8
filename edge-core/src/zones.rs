/// Static proximity table: countries without a local cache are served by
/// a nearby country that has one. One hop only, never chained.
use std::collections::HashMap;

const BUILTIN_FALLBACKS: &[(&str, &str)] = &[
    // Americas
    ("MX", "US"),
    ("AR", "BR"),
    ("CL", "BR"),
    ("PE", "BR"),
    ("CO", "US"),
    ("VE", "US"),
    ("EC", "BR"),
    ("UY", "BR"),
    ("PY", "BR"),
    ("BO", "BR"),
    ("PA", "US"),
    ("GT", "US"),
    ("HN", "US"),
    ("SV", "US"),
    ("NI", "US"),
    ("DO", "US"),
    ("CU", "US"),
    ("PR", "US"),
    ("CA", "US"),
    // Europe
    ("FR", "ES"),
    ("IT", "ES"),
    ("PT", "ES"),
    ("GB", "ES"),
    ("NL", "DE"),
    ("BE", "DE"),
    ("CH", "DE"),
    ("AT", "DE"),
    // Asia / Oceania
    ("CN", "JP"),
    ("KR", "JP"),
    ("TW", "JP"),
    ("SG", "JP"),
    ("AU", "JP"),
    ("NZ", "JP"),
    ("IN", "JP"),
    ("TH", "JP"),
    ("VN", "JP"),
    ("PH", "JP"),
    ("ID", "JP"),
    ("MY", "JP"),
];

#[derive(Debug, Clone)]
pub struct ZoneFallbackMap {
    map: HashMap<String, String>,
}

impl ZoneFallbackMap {
    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN_FALLBACKS.iter().copied())
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = pairs
            .into_iter()
            .map(|(from, to)| (from.to_ascii_uppercase(), to.to_ascii_uppercase()))
            .collect();
        Self { map }
    }

    /// Configured substitute for `country`, if any.
    pub fn substitute(&self, country: &str) -> Option<&str> {
        self.map.get(country).map(String::as_str)
    }

    /// Country whose caches serve `country`: the substitute or itself.
    pub fn resolve<'a>(&'a self, country: &'a str) -> &'a str {
        self.substitute(country).unwrap_or(country)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for ZoneFallbackMap {
    fn default() -> Self {
        Self::builtin()
    }
}
