//! Type name → table name.

const IRREGULAR: &[(&str, &str)] = &[("person", "people"), ("child", "children"), ("man", "men")];

/// `BlogPost` → `blog_post`.
pub fn underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// English plural of the last `_`-separated word.
pub fn pluralize(word: &str) -> String {
    let (head, last) = match word.rfind('_') {
        Some(i) => word.split_at(i + 1),
        None => ("", word),
    };
    format!("{head}{}", plural_word(last))
}

fn plural_word(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    for (singular, plural) in IRREGULAR {
        if let Some(stem) = word.strip_suffix(singular) {
            return format!("{stem}{plural}");
        }
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    if word.ends_with(['s', 'x', 'z']) || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{word}es");
    }
    format!("{word}s")
}

/// Table name for a Rust type path: module path and generics are dropped,
/// the rest is snake-cased and pluralized.
pub fn tableize(type_name: &str) -> String {
    let bare = type_name.split('<').next().unwrap_or(type_name);
    let short = bare.rsplit("::").next().unwrap_or(bare);
    pluralize(&underscore(short))
}
