//! URL slugs derived from display names.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A URL-safe, human-readable identifier derived from a display name.
///
/// Slugs contain only lower-case ASCII letters, digits, and single hyphens
/// between words. Common Latin diacritics are transliterated, apostrophes are
/// dropped, and every other run of punctuation or whitespace becomes one hyphen.
///
/// ```
/// use delicious_core::Slug;
///
/// assert_eq!(Slug::from_name("Wes's Café & Bar").as_str(), "wess-cafe-and-bar");
/// assert_eq!(Slug::from_name("  Pizza   Hut!! ").as_str(), "pizza-hut");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Slug used when a name contains nothing that survives slugification.
    pub const FALLBACK: &'static str = "store";

    /// Derive a slug from a display name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let mut out = String::with_capacity(name.len());
        let mut pending_hyphen = false;

        for c in name.chars().flat_map(char::to_lowercase) {
            if matches!(c, '\'' | '\u{2019}') {
                continue;
            }
            let mapped = match c {
                'a'..='z' | '0'..='9' => None,
                '&' => Some(" and "),
                _ => transliterate(c),
            };
            match mapped {
                None if c.is_ascii_alphanumeric() => {
                    if pending_hyphen && !out.is_empty() {
                        out.push('-');
                    }
                    pending_hyphen = false;
                    out.push(c);
                }
                Some(replacement) => {
                    for r in replacement.chars() {
                        if r == ' ' {
                            pending_hyphen = true;
                        } else {
                            if pending_hyphen && !out.is_empty() {
                                out.push('-');
                            }
                            pending_hyphen = false;
                            out.push(r);
                        }
                    }
                }
                None => pending_hyphen = true,
            }
        }

        if out.is_empty() {
            out.push_str(Self::FALLBACK);
        }
        Self(out)
    }

    /// Returns this slug with a `-n` disambiguation suffix.
    #[must_use]
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    /// Case-insensitive POSIX regex matching this slug and its numbered
    /// variants (`base`, `base-2`, `base-17`, ...).
    ///
    /// Slugs only contain `[a-z0-9-]`, none of which are regex metacharacters
    /// outside a bracket expression, so the base is embedded as-is.
    #[must_use]
    pub fn family_pattern(&self) -> String {
        format!("^({})((-[0-9]*$)?)$", self.0)
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Slug` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// ASCII replacement for common Latin letters with diacritics.
const fn transliterate(c: char) -> Option<&'static str> {
    let replacement = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ī' => "i",
        'ł' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'œ' => "oe",
        'ř' => "r",
        'ś' | 'š' | 'ş' => "s",
        'ß' => "ss",
        'ť' | 'ţ' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(replacement)
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Candidate slugs to try, in order, when saving a store.
///
/// The first candidate follows the count-based rule: `base` when no existing
/// slug is in the family, otherwise `base-<count + 1>`. Each further candidate
/// bumps the suffix by one, which is what a save retries with after losing a
/// race on the unique slug index.
///
/// ```
/// use delicious_core::{Slug, SlugCandidates};
///
/// let base = Slug::from_name("Omar");
/// let first_two: Vec<String> = SlugCandidates::new(base, 1)
///     .take(2)
///     .map(Slug::into_inner)
///     .collect();
/// assert_eq!(first_two, ["omar-2", "omar-3"]);
/// ```
#[derive(Debug, Clone)]
pub struct SlugCandidates {
    base: Slug,
    next: u32,
}

impl SlugCandidates {
    /// Start from `base` given how many slugs of its family already exist.
    #[must_use]
    pub fn new(base: Slug, existing: u32) -> Self {
        Self {
            base,
            next: existing.saturating_add(1),
        }
    }
}

impl Iterator for SlugCandidates {
    type Item = Slug;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.next;
        self.next = self.next.checked_add(1)?;
        if n == 1 {
            Some(self.base.clone())
        } else {
            Some(self.base.with_suffix(n))
        }
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Slug {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Slug {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Slug {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_basic() {
        assert_eq!(Slug::from_name("Omar").as_str(), "omar");
        assert_eq!(Slug::from_name("Hot Tamale Cafe").as_str(), "hot-tamale-cafe");
    }

    #[test]
    fn test_from_name_collapses_separators() {
        assert_eq!(Slug::from_name("  --Big   Bite--  ").as_str(), "big-bite");
        assert_eq!(Slug::from_name("A/B_C.D").as_str(), "a-b-c-d");
    }

    #[test]
    fn test_from_name_transliterates() {
        assert_eq!(Slug::from_name("Crème Brûlée").as_str(), "creme-brulee");
        assert_eq!(Slug::from_name("Straße").as_str(), "strasse");
    }

    #[test]
    fn test_from_name_drops_apostrophes() {
        assert_eq!(Slug::from_name("Bob's Burgers").as_str(), "bobs-burgers");
        assert_eq!(Slug::from_name("Bob\u{2019}s").as_str(), "bobs");
    }

    #[test]
    fn test_from_name_ampersand() {
        assert_eq!(Slug::from_name("Fish & Chips").as_str(), "fish-and-chips");
        assert_eq!(Slug::from_name("&").as_str(), "and");
    }

    #[test]
    fn test_from_name_fallback() {
        assert_eq!(Slug::from_name("!!!").as_str(), Slug::FALLBACK);
        assert_eq!(Slug::from_name("").as_str(), Slug::FALLBACK);
    }

    #[test]
    fn test_family_pattern() {
        let base = Slug::from_name("Pizza Hut");
        assert_eq!(base.family_pattern(), "^(pizza-hut)((-[0-9]*$)?)$");
    }

    #[test]
    fn test_candidates_without_existing() {
        let got: Vec<String> = SlugCandidates::new(Slug::from_name("Omar"), 0)
            .take(3)
            .map(Slug::into_inner)
            .collect();
        assert_eq!(got, ["omar", "omar-2", "omar-3"]);
    }

    #[test]
    fn test_candidates_follow_existing_count() {
        let mut candidates = SlugCandidates::new(Slug::from_name("Omar"), 1);
        assert_eq!(candidates.next().map(Slug::into_inner).as_deref(), Some("omar-2"));

        let mut candidates = SlugCandidates::new(Slug::from_name("Omar"), 4);
        assert_eq!(candidates.next().map(Slug::into_inner).as_deref(), Some("omar-5"));
        assert_eq!(candidates.next().map(Slug::into_inner).as_deref(), Some("omar-6"));
    }
}
