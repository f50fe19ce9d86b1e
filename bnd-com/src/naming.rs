//! Name rules: native identifiers → display ("nice") names.
//!
//! All operations are pure functions of the input and the configured lists.
//! Nothing here depends on which element asked first, which is what keeps
//! the type map and generated output reproducible.

use std::collections::HashSet;

use crate::config::NamingConfig;

/// Characters that split an identifier into segments.
const SEPARATORS: &[char] = &['_', '-', ' '];

/// Prefix, acronym and reserved-word configuration for one generation run.
#[derive(Debug, Clone, Default)]
pub struct NameRules {
    /// Stripped from every element name, longest first.
    prefixes: Vec<String>,
    /// Hungarian-style prefixes stripped from parameter names only.
    parameter_prefixes: Vec<String>,
    /// All-caps segments kept verbatim when casing.
    acronyms: HashSet<String>,
    /// Display names that get a trailing `_`.
    reserved_words: HashSet<String>,
}

impl NameRules {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: sorted_longest_first(prefixes),
            ..Self::default()
        }
    }

    pub fn with_parameter_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_prefixes = sorted_longest_first(prefixes);
        self
    }

    pub fn with_acronyms<I, S>(mut self, acronyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acronyms = acronyms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reserved_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_words = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_config(cfg: &NamingConfig) -> Self {
        Self::new(cfg.prefixes.iter().cloned())
            .with_parameter_prefixes(cfg.parameter_prefixes.iter().cloned())
            .with_acronyms(cfg.acronyms.iter().cloned())
            .with_reserved_words(cfg.reserved_words.iter().cloned())
    }

    /// Strip configured prefixes anchored at position 0.
    ///
    /// Stripping repeats until no prefix matches, so the result is a fixed
    /// point: `remove_prefixes(remove_prefixes(s)) == remove_prefixes(s)`.
    /// A prefix only matches whole tokens (`I` strips from `IUnknown`, not
    /// from `INDEX_BUFFER`).
    pub fn remove_prefixes<'a>(&self, native: &'a str) -> &'a str {
        strip_tokens(&self.prefixes, native)
    }

    /// Strip Hungarian-style parameter prefixes (`pp`, `p`, `dw`, ...).
    pub fn remove_parameter_prefixes<'a>(&self, native: &'a str) -> &'a str {
        strip_tokens(&self.parameter_prefixes, native)
    }

    /// `USAGE_DEFAULT` → `UsageDefault`, `CreateBuffer` → `CreateBuffer`.
    ///
    /// Empty segments are dropped. Fully upper-case segments are capitalized
    /// unless listed as acronyms; mixed-case segments keep their inner casing.
    pub fn pascal_case_from_underscores(&self, stripped: &str) -> String {
        segments(stripped).map(|seg| self.case_segment(seg)).collect()
    }

    /// Like [`pascal_case_from_underscores`](Self::pascal_case_from_underscores)
    /// with the leading word lower-cased: `BUFFER_DESC` → `bufferDesc`.
    pub fn camel_case_from_underscores(&self, stripped: &str) -> String {
        let mut out = String::with_capacity(stripped.len());
        for (i, seg) in segments(stripped).enumerate() {
            if i == 0 {
                out.push_str(&lower_leading_word(seg));
            } else {
                out.push_str(&self.case_segment(seg));
            }
        }
        out
    }

    /// Default display name: Pascal case of the prefix-stripped name.
    pub fn nice_name(&self, native: &str) -> String {
        self.pascal_case_from_underscores(self.remove_prefixes(native))
    }

    /// Display name for a parameter: camel case after Hungarian stripping.
    pub fn parameter_name(&self, native: &str) -> String {
        self.camel_case_from_underscores(self.remove_parameter_prefixes(native))
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_words.contains(name)
    }

    /// Append `_` to reserved words, pass everything else through.
    pub fn escape_reserved(&self, name: String) -> String {
        if self.is_reserved(&name) {
            format!("{name}_")
        } else {
            name
        }
    }

    /// First of `base`, `base2`, `base3`, ... for which `taken` is false.
    pub fn disambiguate(&self, base: &str, taken: impl Fn(&str) -> bool) -> String {
        if !taken(base) {
            return base.to_string();
        }
        (2u32..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    fn case_segment(&self, seg: &str) -> String {
        if self.acronyms.contains(seg) {
            return seg.to_string();
        }
        let mut chars = seg.chars();
        let Some(first) = chars.next() else {
            return String::new();
        };
        let rest = chars.as_str();
        let mut out: String = first.to_uppercase().collect();
        if is_all_caps(seg) {
            out.push_str(&rest.to_lowercase());
        } else {
            out.push_str(rest);
        }
        out
    }
}

fn sorted_longest_first<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = items
        .into_iter()
        .map(Into::into)
        .filter(|p| !p.is_empty())
        .collect();
    // Ties broken lexicographically so configuration order never matters.
    out.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    out.dedup();
    out
}

fn strip_tokens<'a>(prefixes: &[String], native: &'a str) -> &'a str {
    let mut current = native;
    'outer: loop {
        for prefix in prefixes {
            if let Some(rest) = current.strip_prefix(prefix.as_str())
                && is_token_boundary(prefix, rest)
            {
                current = rest;
                continue 'outer;
            }
        }
        return current;
    }
}

/// Whether `prefix` ends a whole token when followed by `rest`.
///
/// `I` + `Unknown` is a boundary (new CamelCase word), `I` + `NDEX_BUFFER`
/// and `D3D` + `11Device` are not.
fn is_token_boundary(prefix: &str, rest: &str) -> bool {
    let Some(last) = prefix.chars().last() else {
        return false;
    };
    let mut rest_chars = rest.chars();
    let Some(next) = rest_chars.next() else {
        return true;
    };
    if SEPARATORS.contains(&last) || SEPARATORS.contains(&next) {
        return true;
    }
    if !next.is_uppercase() {
        return false;
    }
    if last.is_lowercase() || last.is_ascii_digit() {
        return true;
    }
    rest_chars.next().is_some_and(|c| c.is_lowercase())
}

/// `Device` → `device`, `SDKVersion` → `sdkVersion`, `NUM` → `num`.
fn lower_leading_word(seg: &str) -> String {
    if is_all_caps(seg) {
        return seg.to_lowercase();
    }
    let upper_run = seg.chars().take_while(|c| c.is_uppercase()).count();
    // Keep the capital that starts the next word in an acronym run.
    let lower = upper_run.saturating_sub(1).max(1);
    seg.chars()
        .enumerate()
        .flat_map(|(i, c)| {
            let lowered: Vec<char> = if i < lower {
                c.to_lowercase().collect()
            } else {
                vec![c]
            };
            lowered
        })
        .collect()
}

fn segments(s: &str) -> impl Iterator<Item = &str> {
    s.split(SEPARATORS).filter(|seg| !seg.is_empty())
}

fn is_all_caps(seg: &str) -> bool {
    seg.chars().any(|c| c.is_uppercase()) && !seg.chars().any(|c| c.is_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d3d_rules() -> NameRules {
        NameRules::new(["ID3D11_", "ID3D11", "D3D11_", "I"])
            .with_parameter_prefixes(["pp", "p", "dw", "b"])
    }

    #[test]
    fn strips_interface_tag_prefix() {
        let rules = d3d_rules();
        let stripped = rules.remove_prefixes("ID3D11_CreateBuffer");
        assert_eq!(stripped, "CreateBuffer");
        assert_eq!(rules.pascal_case_from_underscores(stripped), "CreateBuffer");
        assert_eq!(rules.nice_name("ID3D11_CreateBuffer"), "CreateBuffer");
    }

    #[test]
    fn no_matching_prefix_is_a_noop() {
        let rules = NameRules::default();
        assert_eq!(rules.remove_prefixes("D3D11_USAGE_DEFAULT"), "D3D11_USAGE_DEFAULT");
        assert_eq!(
            rules.pascal_case_from_underscores("D3D11_USAGE_DEFAULT"),
            "D3d11UsageDefault"
        );
    }

    #[test]
    fn acronym_segments_are_preserved() {
        let rules = NameRules::default().with_acronyms(["D3D11", "DXGI"]);
        assert_eq!(
            rules.pascal_case_from_underscores("D3D11_USAGE_DEFAULT"),
            "D3D11UsageDefault"
        );
        assert_eq!(
            rules.pascal_case_from_underscores("DXGI_FORMAT_R8G8B8A8_UNORM"),
            "DXGIFormatR8g8b8a8Unorm"
        );
    }

    #[test]
    fn configured_prefix_yields_usage_default() {
        let rules = d3d_rules();
        assert_eq!(rules.nice_name("D3D11_USAGE_DEFAULT"), "UsageDefault");
    }

    #[test]
    fn prefix_only_matches_whole_tokens() {
        let rules = d3d_rules();
        assert_eq!(rules.remove_prefixes("IUnknown"), "Unknown");
        assert_eq!(rules.remove_prefixes("INDEX_BUFFER"), "INDEX_BUFFER");
        assert_eq!(rules.remove_prefixes("ID3D11Device"), "Device");
        assert_eq!(rules.remove_prefixes("Interface"), "Interface");
        // Mid-string occurrences are never touched.
        assert_eq!(rules.remove_prefixes("CreateD3D11_Thing"), "CreateD3D11_Thing");
    }

    #[test]
    fn remove_prefixes_is_idempotent() {
        let rules = d3d_rules();
        for s in [
            "ID3D11_ID3D11_Twice",
            "ID3D11Device",
            "D3D11_USAGE",
            "IIFoo",
            "I",
            "",
            "plain",
            "D3D11_D3D11_",
        ] {
            let once = rules.remove_prefixes(s);
            assert_eq!(rules.remove_prefixes(once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn pascal_case_is_deterministic() {
        let rules = d3d_rules().with_acronyms(["GUID"]);
        for s in ["BUFFER_DESC", "GUID_value", "__x__y__", "MixedCase_thing"] {
            let first = rules.pascal_case_from_underscores(s);
            for _ in 0..3 {
                assert_eq!(rules.pascal_case_from_underscores(s), first);
            }
        }
    }

    #[test]
    fn empty_segments_are_dropped() {
        let rules = NameRules::default();
        assert_eq!(rules.pascal_case_from_underscores("__BIND__VERTEX_BUFFER_"), "BindVertexBuffer");
        assert_eq!(rules.pascal_case_from_underscores(""), "");
        assert_eq!(rules.pascal_case_from_underscores("___"), "");
    }

    #[test]
    fn prefix_only_input_strips_to_empty() {
        let rules = d3d_rules();
        assert_eq!(rules.remove_prefixes("D3D11_"), "");
        assert_eq!(rules.nice_name("ID3D11"), "");
    }

    #[test]
    fn parameter_names_are_camel_cased() {
        let rules = d3d_rules();
        assert_eq!(rules.parameter_name("ppDevice"), "device");
        assert_eq!(rules.parameter_name("pDesc"), "desc");
        assert_eq!(rules.parameter_name("Flags"), "flags");
        assert_eq!(rules.parameter_name("riid"), "riid");
        assert_eq!(rules.parameter_name("SDKVersion"), "sdkVersion");
        assert_eq!(rules.parameter_name("NUM_VIEWS"), "numViews");
        // "position" does not start a new word after "p".
        assert_eq!(rules.parameter_name("position"), "position");
    }

    #[test]
    fn reserved_words_are_escaped() {
        let rules = NameRules::default().with_reserved_words(["type", "ref"]);
        assert_eq!(rules.escape_reserved("type".into()), "type_");
        assert_eq!(rules.escape_reserved("Type".into()), "Type");
    }

    #[test]
    fn disambiguate_appends_counter() {
        let rules = NameRules::default();
        let taken = ["GetDesc", "GetDesc2"];
        assert_eq!(
            rules.disambiguate("GetDesc", |n| taken.contains(&n)),
            "GetDesc3"
        );
        assert_eq!(rules.disambiguate("Map", |n| taken.contains(&n)), "Map");
    }
}
