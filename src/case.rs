//! Naming helpers for model classes: short names, default table/collection names and labels.

/// Last segment of a fully qualified class name. Accepts `\`, `::` and `:` separators.
/// e.g. "App\\Entity\\Category" -> "Category", "AppBundle:Category" -> "Category"
pub fn class_short_name(class: &str) -> &str {
    class
        .rsplit(|c| c == '\\' || c == ':')
        .find(|s| !s.is_empty())
        .unwrap_or(class)
}

/// Convert a single identifier from CamelCase/camelCase to snake_case.
/// e.g. "ProductCategory" -> "product_category", "createdAt" -> "created_at"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Default storage name for a class: snake_case of its short name.
pub fn default_storage_name(class: &str) -> String {
    to_snake_case(class_short_name(class))
}

/// Human label for a property or model name.
/// e.g. "createdAt" -> "Created at", "product_category" -> "Product category"
pub fn humanize(s: &str) -> String {
    let snake = to_snake_case(s);
    let spaced = snake.replace('_', " ");
    let trimmed = spaced.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_handles_namespace_separators() {
        assert_eq!(class_short_name("App\\Entity\\Category"), "Category");
        assert_eq!(class_short_name("AppBundle:Category"), "Category");
        assert_eq!(class_short_name("app::document::Product"), "Product");
        assert_eq!(class_short_name("Plain"), "Plain");
    }

    #[test]
    fn storage_names_and_labels() {
        assert_eq!(default_storage_name("App\\Entity\\ProductCategory"), "product_category");
        assert_eq!(humanize("createdAt"), "Created at");
        assert_eq!(humanize("product_category"), "Product category");
    }
}
