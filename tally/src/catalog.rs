use crate::oracle::Symbol;

/// Function and variable names reported by the oracle, grouped the way the
/// completion popup presents them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolCatalog {
    basic: Vec<String>,
    advanced: Vec<String>,
    functions: Vec<String>,
    variables: Vec<String>,
}

impl SymbolCatalog {
    pub fn from_symbols(functions: &[Symbol], variables: &[Symbol]) -> Self {
        let mut catalog = Self::default();

        for f in functions {
            if f.name.is_empty() || f.category.is_empty() {
                continue;
            }
            catalog.functions.push(f.name.clone());
            if is_advanced_function(&f.name, &f.category) {
                catalog.advanced.push(f.name.clone());
            } else {
                catalog.basic.push(f.name.clone());
            }
        }

        for v in variables {
            if v.name.is_empty() || is_hidden_variable_category(&v.category) {
                continue;
            }
            catalog.variables.push(v.name.clone());
            catalog.advanced.push(v.name.clone());
        }

        sort_case_insensitive(&mut catalog.basic);
        sort_case_insensitive(&mut catalog.advanced);
        catalog
    }

    /// Basic functions, sorted case-insensitively.
    pub fn basic(&self) -> &[String] {
        &self.basic
    }

    /// Advanced functions plus variables, sorted case-insensitively.
    pub fn advanced(&self) -> &[String] {
        &self.advanced
    }

    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.variables.is_empty()
    }
}

fn sort_case_insensitive(names: &mut [String]) {
    names.sort_by_cached_key(|n| n.to_lowercase());
}

fn is_advanced_function(name: &str, category: &str) -> bool {
    const ADVANCED: &[&str] = &[
        "Utilities",
        "Step Functions",
        "Combinatorics",
        "Logical",
        "Date & Time",
        "Miscellaneous",
        "Number Theory/Arithmetics",
        "Number Theory/Integers",
        "Number Theory/Number Bases",
        "Number Theory/Polynomials",
        "Number Theory/Prime Numbers",
        "Calculus/Named Integrals",
        "Economics",
        "Special Functions",
        "Complex Numbers",
    ];
    const ADVANCED_PREFIXES: &[&str] = &[
        "Utilities/",
        "Statistics/",
        "Economics/",
        "Geometry/",
        "Special Functions/",
    ];

    if ADVANCED.contains(&category) || ADVANCED_PREFIXES.iter().any(|p| category.contains(p)) {
        return true;
    }
    match category {
        "Exponents & Logarithms" => {
            matches!(name, "lambertw" | "cis" | "sqrtpi" | "pow" | "exp10" | "exp2")
        }
        "Matrices & Vectors" => matches!(
            name,
            "export" | "genvector" | "load" | "permanent" | "area" | "matrix2vector"
        ),
        _ => false,
    }
}

fn is_hidden_variable_category(category: &str) -> bool {
    matches!(
        category,
        "" | "Temporary" | "Unknowns" | "Large Numbers" | "Small Numbers"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, category: &str) -> Symbol {
        Symbol::new(name, category)
    }

    #[test]
    fn splits_basic_and_advanced() {
        let catalog = SymbolCatalog::from_symbols(
            &[
                sym("sin", "Trigonometry"),
                sym("gcd", "Number Theory/Arithmetics"),
                sym("mean", "Statistics/Descriptive Statistics"),
                sym("sqrt", "Exponents & Logarithms"),
                sym("pow", "Exponents & Logarithms"),
                sym("det", "Matrices & Vectors"),
                sym("permanent", "Matrices & Vectors"),
            ],
            &[],
        );
        assert_eq!(catalog.basic(), ["det", "sin", "sqrt"]);
        assert_eq!(catalog.advanced(), ["gcd", "mean", "permanent", "pow"]);
    }

    #[test]
    fn drops_unnamed_or_uncategorized_functions() {
        let catalog =
            SymbolCatalog::from_symbols(&[sym("", "Trigonometry"), sym("cos", "")], &[]);
        assert!(catalog.is_empty());
    }

    #[test]
    fn variables_join_advanced_group() {
        let catalog = SymbolCatalog::from_symbols(
            &[sym("sin", "Trigonometry")],
            &[
                sym("pi", "Basic Constants"),
                sym("x", "Unknowns"),
                sym("googol", "Large Numbers"),
                sym("tmp", "Temporary"),
            ],
        );
        assert_eq!(catalog.variables(), ["pi"]);
        assert_eq!(catalog.advanced(), ["pi"]);
    }

    #[test]
    fn groups_sort_case_insensitively() {
        let catalog = SymbolCatalog::from_symbols(
            &[
                sym("Beta", "Trigonometry"),
                sym("alpha", "Trigonometry"),
                sym("Gamma", "Trigonometry"),
            ],
            &[],
        );
        assert_eq!(catalog.basic(), ["alpha", "Beta", "Gamma"]);
    }
}
