use crate::catalog::SymbolCatalog;

const OPERATORS: &[char] = &['+', '-', '*', '/', '=', '(', ')'];

/// A variable name must be longer than this to mark a line as calculable.
const MIN_VARIABLE_LEN: usize = 3;

/// Decide whether a raw line looks like something worth sending to the
/// oracle. Rules are checked in order and the first match decides.
pub fn should_evaluate(text: &str, catalog: &SymbolCatalog) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    if text.contains("http://") {
        return false;
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    if text == "tutorial()" {
        return false;
    }
    if text.contains(OPERATORS) {
        return true;
    }
    if catalog
        .functions()
        .iter()
        .any(|f| text.contains(&format!("{f}(")))
    {
        return true;
    }
    if catalog
        .variables()
        .iter()
        .any(|v| v.chars().count() > MIN_VARIABLE_LEN && text.contains(v.as_str()))
    {
        return true;
    }
    text.starts_with("ans")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Symbol;

    fn catalog() -> SymbolCatalog {
        SymbolCatalog::from_symbols(
            &[
                Symbol::new("sin", "Trigonometry"),
                Symbol::new("sqrt", "Exponents & Logarithms"),
            ],
            &[
                Symbol::new("pi", "Basic Constants"),
                Symbol::new("golden", "Basic Constants"),
            ],
        )
    }

    #[test]
    fn rejects_blank_and_prose() {
        let c = catalog();
        assert!(!should_evaluate("", &c));
        assert!(!should_evaluate("   ", &c));
        assert!(!should_evaluate("hello world", &c));
    }

    #[test]
    fn bare_function_name_is_not_calculable() {
        assert!(!should_evaluate("sin", &catalog()));
    }

    #[test]
    fn function_call_is_calculable() {
        let c = catalog();
        assert!(should_evaluate("sin(30)", &c));
        assert!(should_evaluate("sqrt(x)", &c));
    }

    #[test]
    fn urls_are_rejected_even_with_digits() {
        assert!(!should_evaluate("see http://example.com/1", &catalog()));
    }

    #[test]
    fn digits_and_operators_are_calculable() {
        let c = catalog();
        assert!(should_evaluate("2", &c));
        assert!(should_evaluate("a + b", &c));
        assert!(should_evaluate("x = y", &c));
    }

    #[test]
    fn tutorial_command_is_rejected() {
        assert!(!should_evaluate("tutorial()", &catalog()));
    }

    #[test]
    fn long_variable_names_are_calculable() {
        let c = catalog();
        assert!(should_evaluate("golden", &c));
        assert!(!should_evaluate("pi", &c));
    }

    #[test]
    fn ans_prefix_is_calculable() {
        let c = catalog();
        assert!(should_evaluate("ans", &c));
        assert!(should_evaluate("ans2", &c));
        assert!(!should_evaluate("the ans", &c));
    }
}
