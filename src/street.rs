use crate::rules::CleaningRules;
use regex::Match;
use std::borrow::Cow;

/// The trailing whitespace-delimited token of a street name, e.g. `St.` in `"12 Canal St."`.
pub fn street_type<'a>(name: &'a str, rules: &CleaningRules) -> Option<Match<'a>> {
    rules.street_type.find(name)
}

/// Expands an abbreviated street suffix through the rule mapping.
///
/// Only the trailing token that was detected is replaced, so an abbreviation
/// earlier in the name (`"St Charles St"`) stays as written. Names whose
/// suffix is already expected, or has no mapping, come back borrowed.
pub fn update_name<'a>(name: &'a str, rules: &CleaningRules) -> Cow<'a, str> {
    let Some(m) = street_type(name, rules) else {
        return Cow::Borrowed(name);
    };

    let suffix = m.as_str();
    if rules.is_expected(suffix) {
        return Cow::Borrowed(name);
    }

    match rules.full_form(suffix) {
        Some(full) => {
            let mut updated = String::with_capacity(name.len() + full.len());
            updated.push_str(&name[..m.start()]);
            updated.push_str(full);
            updated.push_str(&name[m.end()..]);
            Cow::Owned(updated)
        }
        None => Cow::Borrowed(name),
    }
}
