//! Display names and flags for the currencies offered in the picker

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub flag: &'static str,
}

const CATALOG: &[CurrencyInfo] = &[
    CurrencyInfo { code: "USD", name: "US Dollar", flag: "🇺🇸" },
    CurrencyInfo { code: "EUR", name: "Euro", flag: "🇪🇺" },
    CurrencyInfo { code: "GBP", name: "British Pound", flag: "🇬🇧" },
    CurrencyInfo { code: "JPY", name: "Japanese Yen", flag: "🇯🇵" },
    CurrencyInfo { code: "AUD", name: "Australian Dollar", flag: "🇦🇺" },
    CurrencyInfo { code: "CAD", name: "Canadian Dollar", flag: "🇨🇦" },
    CurrencyInfo { code: "CHF", name: "Swiss Franc", flag: "🇨🇭" },
    CurrencyInfo { code: "CNY", name: "Chinese Yuan", flag: "🇨🇳" },
    CurrencyInfo { code: "NZD", name: "New Zealand Dollar", flag: "🇳🇿" },
    CurrencyInfo { code: "PHP", name: "Philippine Peso", flag: "🇵🇭" },
];

pub fn catalog() -> &'static [CurrencyInfo] {
    CATALOG
}

pub fn lookup(code: &str) -> Option<&'static CurrencyInfo> {
    CATALOG.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Display name for `code`, or the code itself when it is not in the catalog.
pub fn name(code: &str) -> &str {
    lookup(code).map_or(code, |c| c.name)
}

pub fn flag(code: &str) -> &'static str {
    lookup(code).map_or("", |c| c.flag)
}

/// Catalog entries whose code or name contains `term`, ignoring case.
pub fn search(term: &str) -> Vec<&'static CurrencyInfo> {
    let term = term.trim().to_lowercase();
    CATALOG
        .iter()
        .filter(|c| {
            c.code.to_lowercase().contains(&term) || c.name.to_lowercase().contains(&term)
        })
        .collect()
}
