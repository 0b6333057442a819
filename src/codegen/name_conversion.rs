//! Case conversion and C++ namespace validation (§4.H.1, §4.H.4).
//!
//! Ported from `compiler/util/name_conversion.py`'s `snake_to_camel`/
//! `camel_to_k_camel`/`snake_to_k_camel`; the prelude's field and enum
//! value names are `snake_case`/`SHOUTY_CASE` in source, and the only
//! two case conversions the generator ever needs are `SHOUTY_CASE` ->
//! `CamelCase` and `SHOUTY_CASE` -> `kCamelCase` (the supported
//! `enum_case` attribute values).

/// Converts a `snake_case` or `SHOUTY_CASE` name to `CamelCase` by
/// capitalizing each underscore-separated word and joining them.
#[must_use] pub fn to_camel_case(name: &str) -> String {
  name
    .split('_')
    .filter(|w| !w.is_empty())
    .map(capitalize)
    .collect()
}

/// Converts a `snake_case` or `SHOUTY_CASE` name to `kCamelCase`.
#[must_use] pub fn to_k_camel_case(name: &str) -> String {
  format!("k{}", to_camel_case(name))
}

fn capitalize(word: &str) -> String {
  let mut chars = word.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
    None => String::new(),
  }
}

/// Splits a dotted C++ namespace (`"foo::bar::baz"`) into its components,
/// rejecting a leading `::` and an empty namespace (§4.H.1).
pub fn split_namespace(namespace: &str) -> Result<Vec<String>, String> {
  let trimmed = namespace.trim();
  if trimmed.is_empty() {
    return Err("namespace must not be empty".to_string());
  }
  if let Some(rest) = trimmed.strip_prefix("::") {
    let _ = rest;
    return Err("namespace must not begin with '::'".to_string());
  }
  let components: Vec<String> = trimmed.split("::").map(|s| s.trim().to_string()).collect();
  if components.iter().any(|c| c.is_empty()) {
    return Err(format!("'{namespace}' is not a valid C++ namespace"));
  }
  for component in &components {
    if !is_valid_identifier(component) {
      return Err(format!("'{component}' is not a valid C++ identifier"));
    }
    if let Some(lang) = crate::reserved_words::reserving_language(component) {
      return Err(format!("'{component}' is a reserved word in {lang}"));
    }
  }
  Ok(components)
}

fn is_valid_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  match chars.next() {
    Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
    _ => return false,
  }
  chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Derives a header guard from a `.emb` file name (§6 "Header file
/// layout produced"): uppercase, non-alphanumerics to `_`, collapse runs
/// of `_`, then append a single trailing `_`.
#[must_use] pub fn header_guard(file_name: &str) -> String {
  let header_path = format!("{file_name}.h").to_uppercase();
  let mut collapsed = String::with_capacity(header_path.len() + 1);
  let mut last_was_underscore = false;
  for c in header_path.chars() {
    let mapped = if c.is_ascii_alphanumeric() { c } else { '_' };
    if mapped == '_' && last_was_underscore {
      continue;
    }
    last_was_underscore = mapped == '_';
    collapsed.push(mapped);
  }
  collapsed.push('_');
  collapsed
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn camel_case_capitalizes_each_word() {
    assert_eq!(to_camel_case("payload_length"), "PayloadLength");
    assert_eq!(to_camel_case("FOO_BAR"), "FooBar");
  }

  #[test]
  fn k_camel_case_prefixes_with_lowercase_k() {
    assert_eq!(to_k_camel_case("payload_length"), "kPayloadLength");
  }

  #[test]
  fn namespace_rejects_leading_double_colon() {
    assert!(split_namespace("::foo::bar").is_err());
  }

  #[test]
  fn namespace_rejects_reserved_word_component() {
    assert!(split_namespace("foo::class").is_err());
  }

  #[test]
  fn namespace_splits_components() {
    assert_eq!(split_namespace("foo::bar_baz").unwrap(), vec!["foo".to_string(), "bar_baz".to_string()]);
  }

  #[test]
  fn header_guard_collapses_and_terminates() {
    assert_eq!(header_guard("a/b-c.emb"), "A_B_C_EMB_H_");
  }
}
