//! Property syntax and the normalised property tree.
//!
//! The checker consumes the tree types below and never sees source syntax;
//! `parse_property` turns strings like
//!
//!   P=? [ F "done" ]
//!   Pmax=? [ "safe" U<=25 "elected" ]
//!   R{"coin_flips"}min=? [ F "done" ]
//!   LRA=? [ "up" ]
//!
//! into a [`Property`]. Leaves of state formulas are label references.

use serde::Serialize;
use unscanny::Scanner;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OptimizationDirection {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StateFormula {
    True,
    Label(String),
    Not(Box<StateFormula>),
    And(Box<StateFormula>, Box<StateFormula>),
    Or(Box<StateFormula>, Box<StateFormula>),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TimeBound {
    Unbounded,
    /// Discrete step bound `<= k`.
    Steps(u64),
    /// Continuous time bound `<= t`.
    Time(f64),
    /// Continuous interval `[lower, upper]`.
    Interval { lower: f64, upper: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PathFormula {
    Next(StateFormula),
    Until {
        before: StateFormula,
        target: StateFormula,
        bound: TimeBound,
    },
    Globally(StateFormula),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RewardKind {
    /// Expected accumulated reward until the target is reached.
    Reachability(StateFormula),
    /// Expected reward accumulated up to the bound.
    Cumulative(TimeBound),
    /// Expected state reward at exactly the bound.
    Instantaneous(TimeBound),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropertyKind {
    Probability(PathFormula),
    Reward {
        reward_model: Option<String>,
        kind: RewardKind,
    },
    /// Expected time until the target is reached (Markov automata).
    ExpectedTime(StateFormula),
    /// Long-run average fraction of time spent in the given states.
    LongRunAverage(StateFormula),
}

/// What to compute: a value, or one of the qualitative sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Query {
    Quantitative,
    /// `P>0 [...]`: the states satisfying the path formula with positive
    /// probability.
    QualitativeGreaterZero,
    /// `P>=1 [...]`: the states satisfying it almost surely.
    QualitativeOne,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub kind: PropertyKind,
    pub direction: Option<OptimizationDirection>,
    pub query: Query,
}

impl std::str::FromStr for Property {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_property(input)
    }
}

pub fn parse_property(input: &str) -> Result<Property, ParseError> {
    let mut s = Scanner::new(input);
    s.eat_whitespace();

    let property = if s.eat_if("LRA") {
        let (direction, query) = parse_quantity(&mut s, false)?;
        let states = bracketed(&mut s, |s| parse_state_formula(s))?;
        Property {
            kind: PropertyKind::LongRunAverage(states),
            direction,
            query,
        }
    } else if s.eat_if('P') {
        let (direction, query) = parse_quantity(&mut s, true)?;
        let path = bracketed(&mut s, |s| parse_path_formula(s))?;
        Property {
            kind: PropertyKind::Probability(path),
            direction,
            query,
        }
    } else if s.eat_if('R') {
        let reward_model = parse_reward_model_name(&mut s)?;
        let (direction, query) = parse_quantity(&mut s, false)?;
        let kind = bracketed(&mut s, |s| parse_reward_kind(s))?;
        Property {
            kind: PropertyKind::Reward { reward_model, kind },
            direction,
            query,
        }
    } else if s.eat_if('T') {
        let (direction, query) = parse_quantity(&mut s, false)?;
        let states = bracketed(&mut s, |s| {
            expect(s, 'F')?;
            parse_state_formula(s)
        })?;
        Property {
            kind: PropertyKind::ExpectedTime(states),
            direction,
            query,
        }
    } else {
        return Err(error(&s, "expected one of P, R, T, LRA"));
    };

    s.eat_whitespace();
    if !s.done() {
        return Err(error(&s, "trailing input after the property"));
    }
    Ok(property)
}

/// `min`/`max` suffix plus the query form (`=?`, `>0`, `>=1`).
fn parse_quantity(
    s: &mut Scanner,
    allow_qualitative: bool,
) -> Result<(Option<OptimizationDirection>, Query), ParseError> {
    let direction = if s.eat_if("min") {
        Some(OptimizationDirection::Minimize)
    } else if s.eat_if("max") {
        Some(OptimizationDirection::Maximize)
    } else {
        None
    };
    s.eat_whitespace();
    let query = if s.eat_if("=?") {
        Query::Quantitative
    } else if s.eat_if(">=1") {
        Query::QualitativeOne
    } else if s.eat_if(">0") {
        Query::QualitativeGreaterZero
    } else {
        return Err(error(s, "expected =?, >0 or >=1"));
    };
    if !allow_qualitative && query != Query::Quantitative {
        return Err(error(s, "qualitative queries only apply to P"));
    }
    Ok((direction, query))
}

fn parse_reward_model_name(s: &mut Scanner) -> Result<Option<String>, ParseError> {
    if !s.eat_if('{') {
        return Ok(None);
    }
    expect(s, '"')?;
    let name = s.eat_while(|c| c != '"').to_string();
    expect(s, '"')?;
    expect(s, '}')?;
    Ok(Some(name))
}

fn bracketed<T>(
    s: &mut Scanner,
    inner: impl FnOnce(&mut Scanner) -> Result<T, ParseError>,
) -> Result<T, ParseError> {
    expect(s, '[')?;
    let result = inner(s)?;
    expect(s, ']')?;
    Ok(result)
}

fn parse_path_formula(s: &mut Scanner) -> Result<PathFormula, ParseError> {
    s.eat_whitespace();
    if s.eat_if('X') {
        return Ok(PathFormula::Next(parse_state_formula(s)?));
    }
    if s.eat_if('G') {
        return Ok(PathFormula::Globally(parse_state_formula(s)?));
    }
    if s.eat_if('F') {
        let bound = parse_time_bound(s)?;
        return Ok(PathFormula::Until {
            before: StateFormula::True,
            target: parse_state_formula(s)?,
            bound,
        });
    }
    let before = parse_state_formula(s)?;
    s.eat_whitespace();
    expect(s, 'U')?;
    let bound = parse_time_bound(s)?;
    let target = parse_state_formula(s)?;
    Ok(PathFormula::Until {
        before,
        target,
        bound,
    })
}

fn parse_reward_kind(s: &mut Scanner) -> Result<RewardKind, ParseError> {
    s.eat_whitespace();
    if s.eat_if('F') {
        return Ok(RewardKind::Reachability(parse_state_formula(s)?));
    }
    if s.eat_if('C') {
        s.eat_whitespace();
        if !s.eat_if("<=") {
            return Err(error(s, "expected <= after C"));
        }
        return Ok(RewardKind::Cumulative(parse_number_bound(s)?));
    }
    if s.eat_if('I') {
        s.eat_whitespace();
        if !s.eat_if('=') {
            return Err(error(s, "expected = after I"));
        }
        return Ok(RewardKind::Instantaneous(parse_number_bound(s)?));
    }
    Err(error(s, "expected one of F, C<=, I="))
}

/// Optional bound directly after U or F: `<=k` or `[a,b]`.
fn parse_time_bound(s: &mut Scanner) -> Result<TimeBound, ParseError> {
    if s.eat_if("<=") {
        return parse_number_bound(s);
    }
    if s.eat_if('[') {
        s.eat_whitespace();
        let lower = parse_f64(s)?;
        s.eat_whitespace();
        expect(s, ',')?;
        s.eat_whitespace();
        let upper = parse_f64(s)?;
        s.eat_whitespace();
        expect(s, ']')?;
        return Ok(TimeBound::Interval { lower, upper });
    }
    Ok(TimeBound::Unbounded)
}

/// A `<=`-style bound: integer literals are step bounds, anything with a
/// fractional part or exponent is a time bound.
fn parse_number_bound(s: &mut Scanner) -> Result<TimeBound, ParseError> {
    s.eat_whitespace();
    let text = s.eat_while(|c: char| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if text.is_empty() {
        return Err(error(s, "expected a number"));
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        let steps = text.parse().map_err(|_| error(s, "invalid step bound"))?;
        Ok(TimeBound::Steps(steps))
    } else {
        let time: f64 = text.parse().map_err(|_| error(s, "invalid time bound"))?;
        Ok(TimeBound::Time(time))
    }
}

fn parse_f64(s: &mut Scanner) -> Result<f64, ParseError> {
    let text = s.eat_while(|c: char| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    text.parse().map_err(|_| error(s, "expected a number"))
}

fn parse_state_formula(s: &mut Scanner) -> Result<StateFormula, ParseError> {
    let mut left = parse_state_atom(s)?;
    loop {
        s.eat_whitespace();
        if s.eat_if('&') {
            let right = parse_state_atom(s)?;
            left = StateFormula::And(Box::new(left), Box::new(right));
        } else if s.eat_if('|') {
            let right = parse_state_atom(s)?;
            left = StateFormula::Or(Box::new(left), Box::new(right));
        } else {
            return Ok(left);
        }
    }
}

fn parse_state_atom(s: &mut Scanner) -> Result<StateFormula, ParseError> {
    s.eat_whitespace();
    if s.eat_if('!') {
        return Ok(StateFormula::Not(Box::new(parse_state_atom(s)?)));
    }
    if s.eat_if('(') {
        let inner = parse_state_formula(s)?;
        s.eat_whitespace();
        expect(s, ')')?;
        return Ok(inner);
    }
    if s.eat_if("true") {
        return Ok(StateFormula::True);
    }
    if s.eat_if('"') {
        let name = s.eat_while(|c| c != '"').to_string();
        expect(s, '"')?;
        return Ok(StateFormula::Label(name));
    }
    Err(error(s, "expected a state formula"))
}

fn expect(s: &mut Scanner, c: char) -> Result<(), ParseError> {
    s.eat_whitespace();
    if s.eat_if(c) {
        Ok(())
    } else {
        Err(error(s, &format!("expected '{c}'")))
    }
}

fn error(s: &Scanner, message: &str) -> ParseError {
    ParseError::Property {
        position: s.cursor(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_unbounded_reachability() {
        let property = parse_property(r#"P=? [ F "done" ]"#).unwrap();
        assert_eq!(property.direction, None);
        assert_eq!(property.query, Query::Quantitative);
        assert_eq!(
            property.kind,
            PropertyKind::Probability(PathFormula::Until {
                before: StateFormula::True,
                target: StateFormula::Label("done".to_string()),
                bound: TimeBound::Unbounded,
            })
        );
    }

    #[test]
    fn parses_bounded_until_with_direction() {
        let property = parse_property(r#"Pmax=? [ "safe" U<=25 "elected" ]"#).unwrap();
        assert_eq!(property.direction, Some(OptimizationDirection::Maximize));
        match property.kind {
            PropertyKind::Probability(PathFormula::Until { before, bound, .. }) => {
                assert_eq!(before, StateFormula::Label("safe".to_string()));
                assert_eq!(bound, TimeBound::Steps(25));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn parses_time_interval() {
        let property = parse_property(r#"P=? [ true U[0.5, 2.0] "full" ]"#).unwrap();
        match property.kind {
            PropertyKind::Probability(PathFormula::Until { bound, .. }) => {
                assert_eq!(bound, TimeBound::Interval { lower: 0.5, upper: 2.0 });
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn parses_named_reward_property() {
        let property = parse_property(r#"R{"coin_flips"}min=? [ F "done" ]"#).unwrap();
        assert_eq!(property.direction, Some(OptimizationDirection::Minimize));
        match property.kind {
            PropertyKind::Reward { reward_model, kind } => {
                assert_eq!(reward_model.as_deref(), Some("coin_flips"));
                assert!(matches!(kind, RewardKind::Reachability(_)));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[rstest]
    #[case(r#"R=? [ C<=10 ]"#, RewardKind::Cumulative(TimeBound::Steps(10)))]
    #[case(r#"R=? [ C<=10.0 ]"#, RewardKind::Cumulative(TimeBound::Time(10.0)))]
    #[case(r#"R=? [ I=4 ]"#, RewardKind::Instantaneous(TimeBound::Steps(4)))]
    fn parses_bounded_reward_kinds(#[case] input: &str, #[case] expected: RewardKind) {
        match parse_property(input).unwrap().kind {
            PropertyKind::Reward { kind, .. } => assert_eq!(kind, expected),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn parses_boolean_structure() {
        let property = parse_property(r#"P>0 [ (!"a" & "b") U "c" | true ]"#).unwrap();
        assert_eq!(property.query, Query::QualitativeGreaterZero);
        match property.kind {
            PropertyKind::Probability(PathFormula::Until { before, target, .. }) => {
                assert!(matches!(before, StateFormula::And(_, _)));
                assert!(matches!(target, StateFormula::Or(_, _)));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn parses_expected_time_and_lra() {
        assert!(matches!(
            parse_property(r#"Tmin=? [ F "done" ]"#).unwrap().kind,
            PropertyKind::ExpectedTime(_)
        ));
        assert!(matches!(
            parse_property(r#"LRAmax=? [ "up" ]"#).unwrap().kind,
            PropertyKind::LongRunAverage(_)
        ));
    }

    #[test]
    fn rejects_garbage() {
        let error = parse_property(r#"Q=? [ F "x" ]"#).unwrap_err();
        insta::assert_snapshot!(
            error.to_string(),
            @"invalid property at offset 0: expected one of P, R, T, LRA"
        );
        assert!(parse_property(r#"P=? [ F "x" ] extra"#).is_err());
        assert!(parse_property(r#"R>0 [ F "x" ]"#).is_err());
    }
}
