use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::prepare::prepare_input;

// The digit run is greedy so `ans12` never matches as `ans1`. Anything may
// follow it (`ans1EUR`, `ans1m`), but an identifier character may not precede it.
static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^A-Za-z_])ans(\d+)").expect("valid regex"));
static BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bans\b").expect("valid regex"));

/// Prepare `text` and substitute reference tokens with the results of earlier
/// lines.
///
/// `ansN` (1-based) resolves to line `N-1` when that line is strictly before
/// `current_index`; an empty result becomes `0`. Forward and self references
/// stay literal. Bare `ans` resolves to the nearest earlier non-empty result,
/// or `0` when there is none.
pub fn resolve(text: &str, current_index: usize, prior_results: &[String]) -> String {
    let prepared = prepare_input(text);
    let visible = current_index.min(prior_results.len());

    let numbered = NUMBERED.replace_all(&prepared, |caps: &Captures| {
        match caps[2].parse::<usize>() {
            Ok(n) if (1..=visible).contains(&n) => {
                format!("{}{}", &caps[1], value_or_zero(&prior_results[n - 1]))
            }
            _ => caps[0].to_string(),
        }
    });

    if !BARE.is_match(&numbered) {
        return numbered.into_owned();
    }
    let latest = prior_results[..visible]
        .iter()
        .rev()
        .find(|r| !r.is_empty())
        .map_or("0", String::as_str);
    BARE.replace_all(&numbered, regex::NoExpand(latest)).into_owned()
}

fn value_or_zero(result: &str) -> &str {
    if result.is_empty() { "0" } else { result }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn numbered_reference_substitutes_prior_result() {
        assert_eq!(resolve("ans1+1", 1, &results(&["4"])), "4+1");
    }

    #[test]
    fn empty_prior_result_becomes_zero() {
        assert_eq!(resolve("ans1*3", 2, &results(&["", "7"])), "0*3");
    }

    #[test]
    fn forward_and_self_references_stay_literal() {
        let r = results(&["1", "2", "3"]);
        assert_eq!(resolve("ans2+ans3", 1, &r), "ans2+ans3");
        assert_eq!(resolve("ans0", 2, &r), "ans0");
    }

    #[test]
    fn bare_ans_uses_nearest_nonempty_result() {
        let r = results(&["4", "", "x"]);
        assert_eq!(resolve("ans*2", 2, &r), "4*2");
        assert_eq!(resolve("ans*2", 3, &r), "x*2");
    }

    #[test]
    fn bare_ans_without_history_is_zero() {
        assert_eq!(resolve("ans+1", 0, &[]), "0+1");
    }

    #[test]
    fn longer_identifiers_untouched() {
        let r = results(&["5"; 12]);
        assert_eq!(resolve("answer + fans", 3, &r), "answer + fans");
        assert_eq!(resolve("fans1 + my_ans2", 3, &r), "fans1 + my_ans2");
    }

    #[test]
    fn numbered_reference_followed_by_unit_or_currency() {
        let r = results(&["4"]);
        assert_eq!(resolve("ans1€", 1, &r), "4EUR");
        assert_eq!(resolve("ans1m", 1, &r), "4m");
        assert_eq!(resolve("2ans1", 1, &r), "24");
    }

    #[test]
    fn digit_run_is_greedy() {
        let r = results(&["5"; 12]);
        assert_eq!(resolve("ans12x", 12, &r), "5x");
        assert_eq!(resolve("ans12", 3, &r), "ans12");
    }

    #[test]
    fn numbered_tokens_do_not_overlap() {
        let mut r = vec![String::new(); 10];
        r[0] = "1".into();
        r[9] = "10".into();
        assert_eq!(resolve("ans1+ans10", 11, &r), "1+10");
    }

    #[test]
    fn comment_and_currency_prepared_first() {
        assert_eq!(resolve("ans1 $ // note ans", 1, &results(&["3"])), "3 USD ");
    }

    #[test]
    fn results_with_dollar_signs_are_inserted_literally() {
        assert_eq!(resolve("ans", 1, &results(&["$1"])), "$1");
    }
}
