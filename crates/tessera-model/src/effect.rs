//! Effect combinators
//!
//! A combinator reduces the effects of every rule that matched one request to
//! a single decision. It runs once per enforcement call over the complete
//! matched set, so the result never depends on rule order.

use std::fmt;
use std::sync::Arc;
use tessera_core::{Effect, Result, TesseraError};

/// Reduces matched rule effects to one allow/deny decision
pub trait EffectCombinator: Send + Sync + fmt::Debug {
    /// Short name used in logs and diagnostics
    fn name(&self) -> &'static str;

    /// Decide from the effects of all matched rules
    ///
    /// An empty slice means nothing matched.
    fn combine(&self, effects: &[Effect]) -> bool;
}

/// `some(where (p.eft == allow)) && !some(where (p.eft == deny))`
///
/// Allows when at least one matched rule allows and none denies. A single deny
/// vetoes any number of allows; nothing matched means deny.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllowUnlessDeny;

impl EffectCombinator for AllowUnlessDeny {
    fn name(&self) -> &'static str {
        "allow-unless-deny"
    }

    fn combine(&self, effects: &[Effect]) -> bool {
        effects.contains(&Effect::Allow) && !effects.contains(&Effect::Deny)
    }
}

/// `some(where (p.eft == allow))`
///
/// Allows when any matched rule allows; deny rules are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllowOverride;

impl EffectCombinator for AllowOverride {
    fn name(&self) -> &'static str {
        "allow-override"
    }

    fn combine(&self, effects: &[Effect]) -> bool {
        effects.contains(&Effect::Allow)
    }
}

/// Map effect expression text to a built-in combinator
///
/// Whitespace is ignored. `policy_keys` are the declared policy keys; the
/// expression must reference one of them. Returns the referenced key with the
/// combinator.
pub fn parse_effect_expression<'a>(
    text: &str,
    policy_keys: impl IntoIterator<Item = &'a str>,
) -> Result<(&'a str, Arc<dyn EffectCombinator>)> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    for key in policy_keys {
        let allow = format!("some(where({key}.eft==allow))");
        let deny = format!("!some(where({key}.eft==deny))");
        if compact == format!("{allow}&&{deny}") {
            return Ok((key, Arc::new(AllowUnlessDeny)));
        }
        if compact == allow {
            return Ok((key, Arc::new(AllowOverride)));
        }
    }
    Err(TesseraError::configuration(format!(
        "unsupported policy effect `{}`",
        text.trim()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use Effect::{Allow, Deny};

    #[test]
    fn test_allow_unless_deny() {
        let c = AllowUnlessDeny;
        assert!(!c.combine(&[]));
        assert!(c.combine(&[Allow]));
        assert!(c.combine(&[Allow, Allow]));
        assert!(!c.combine(&[Deny]));
        assert!(!c.combine(&[Allow, Deny]));
        assert!(!c.combine(&[Deny, Allow, Allow, Allow]));
    }

    #[test]
    fn test_allow_override_ignores_deny() {
        let c = AllowOverride;
        assert!(!c.combine(&[]));
        assert!(c.combine(&[Deny, Allow]));
        assert!(!c.combine(&[Deny]));
    }

    #[test]
    fn test_parse_effect_expression() {
        let (key, c) = parse_effect_expression(
            "some(where (p.eft == allow)) && !some(where (p.eft == deny))",
            ["p"],
        )
        .unwrap();
        assert_eq!(key, "p");
        assert_eq!(c.name(), "allow-unless-deny");

        let (key, c) = parse_effect_expression("some(where (p2.eft == allow))", ["p", "p2"]).unwrap();
        assert_eq!(key, "p2");
        assert_eq!(c.name(), "allow-override");
    }

    #[test]
    fn test_unsupported_effect_rejected() {
        assert_matches!(
            parse_effect_expression("priority(p.eft) || deny", ["p"]),
            Err(TesseraError::Configuration { .. })
        );
        assert_matches!(
            parse_effect_expression("some(where (q.eft == allow))", ["p"]),
            Err(TesseraError::Configuration { .. })
        );
    }
}
