//! Relative-Time Resolver
//!
//! Turns date-math expressions into absolute instants.
//!
//! # Supported Syntax
//!
//! ```text
//! now                      the evaluation instant
//! now-1h                   shift by an amount of a unit
//! now-h                    amount defaults to 1
//! now/d                    round to the day (floor or ceiling)
//! now-1d/d                 shifts and rounds chain left to right
//! 2024-01-15 10:30:00+0100 absolute timestamp
//! 2024-01-15||+1d/d        absolute anchor followed by date math
//! 1705314600000            epoch milliseconds
//! ```
//!
//! Units: `y` year, `M` month, `w` week (Monday based), `d` day, `h` hour,
//! `m` minute, `s` second.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, Offset,
    TimeZone, Timelike, Utc,
};
use nom::{
    branch::alt,
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map, map_res, opt, value},
    multi::many0,
    sequence::preceded,
    IResult,
};

use super::error::{TimeError, TimeResult};

/// Timestamp format sent to the backend (`YYYY-MM-DD HH:mm:ssZZ`)
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";

/// Calendar unit used by shifts and rounding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl TimeUnit {
    /// Grammar symbol for this unit
    pub fn symbol(&self) -> char {
        match self {
            TimeUnit::Year => 'y',
            TimeUnit::Month => 'M',
            TimeUnit::Week => 'w',
            TimeUnit::Day => 'd',
            TimeUnit::Hour => 'h',
            TimeUnit::Minute => 'm',
            TimeUnit::Second => 's',
        }
    }
}

/// One step of date math applied to the anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateMathOp {
    /// Add (or subtract, when negative) an amount of a unit
    Shift { amount: i64, unit: TimeUnit },
    /// Round to the start or end of a unit
    Round(TimeUnit),
}

/// Starting point of an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Evaluation time
    Now,
    /// Fixed instant; `precision` is the smallest unit the text spelled out
    /// when coarser than a second
    Absolute {
        at: DateTime<FixedOffset>,
        precision: Option<TimeUnit>,
    },
}

/// A parsed time expression, ready to be evaluated against any `now`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeExpression {
    source: String,
    anchor: Anchor,
    ops: Vec<DateMathOp>,
}

impl TimeExpression {
    /// Parse an expression; naive timestamps are read in `offset`
    pub fn parse(input: &str, offset: FixedOffset) -> TimeResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TimeError::invalid(input, "empty expression"));
        }

        let (anchor, math) = match trimmed.strip_prefix("now") {
            Some(rest) => (Anchor::Now, rest),
            None => {
                let (absolute, math) = match trimmed.find("||") {
                    Some(idx) => (&trimmed[..idx], &trimmed[idx + 2..]),
                    None => (trimmed, ""),
                };
                let anchor = parse_absolute(absolute, offset).ok_or_else(|| {
                    TimeError::invalid(input, format!("unrecognised timestamp '{}'", absolute))
                })?;
                (anchor, math)
            }
        };

        let ops = match all_consuming(many0(parse_math_op))(math) {
            Ok((_, ops)) => ops,
            Err(_) => {
                return Err(TimeError::invalid(
                    input,
                    format!("invalid date math '{}'", math),
                ))
            }
        };

        Ok(Self {
            source: input.to_string(),
            anchor,
            ops,
        })
    }

    /// The text this expression was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn ops(&self) -> &[DateMathOp] {
        &self.ops
    }

    /// True when the expression depends on the evaluation instant
    pub fn is_relative(&self) -> bool {
        matches!(self.anchor, Anchor::Now)
    }

    /// Evaluate against `now`, expressing the result in `offset`
    ///
    /// `round_up` selects the end of a rounding unit instead of its start.
    pub fn evaluate(
        &self,
        now: DateTime<Utc>,
        offset: FixedOffset,
        round_up: bool,
    ) -> TimeResult<DateTime<FixedOffset>> {
        let out_of_range = || TimeError::OutOfRange {
            expression: self.source.clone(),
        };

        let (mut time, implied) = match &self.anchor {
            Anchor::Now => (now.with_timezone(&offset), None),
            Anchor::Absolute { at, precision } => (at.with_timezone(&offset), *precision),
        };

        if self.ops.is_empty() {
            if let Some(unit) = implied {
                return round(time, unit, round_up).ok_or_else(out_of_range);
            }
        }

        for op in &self.ops {
            time = match *op {
                DateMathOp::Shift { amount, unit } => shift(time, amount, unit),
                DateMathOp::Round(unit) => round(time, unit, round_up),
            }
            .ok_or_else(out_of_range)?;
        }

        Ok(time)
    }
}

/// Resolves expressions in a fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeResolver {
    offset: FixedOffset,
}

impl Default for TimeResolver {
    fn default() -> Self {
        Self::utc()
    }
}

impl TimeResolver {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Parse without evaluating
    pub fn parse(&self, expression: &str) -> TimeResult<TimeExpression> {
        TimeExpression::parse(expression, self.offset)
    }

    /// Resolve against the current instant
    pub fn resolve(&self, expression: &str, round_up: bool) -> TimeResult<DateTime<FixedOffset>> {
        self.resolve_at(expression, round_up, Utc::now())
    }

    /// Resolve against a caller-chosen instant
    ///
    /// Resolving the same expression twice with the same `now` always yields
    /// the same instant.
    pub fn resolve_at(
        &self,
        expression: &str,
        round_up: bool,
        now: DateTime<Utc>,
    ) -> TimeResult<DateTime<FixedOffset>> {
        self.parse(expression)?.evaluate(now, self.offset, round_up)
    }
}

/// Render an instant with a strftime-style format
pub fn format_timestamp(time: &DateTime<FixedOffset>, format: &str) -> String {
    time.format(format).to_string()
}

/// Check that a strftime-style format only contains known specifiers
pub fn is_valid_timestamp_format(format: &str) -> bool {
    use chrono::format::{Item, StrftimeItems};
    !format.is_empty() && StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

/// Parse `Z`, `UTC`, `+HH:MM`, `-HHMM` or `+HH` into an offset
pub fn parse_utc_offset(input: &str) -> Option<FixedOffset> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("z") || input.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match input.chars().next()? {
        '+' => (1, &input[1..]),
        '-' => (-1, &input[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_absolute(input: &str, offset: FixedOffset) -> Option<Anchor> {
    let exact = |at: DateTime<FixedOffset>| Anchor::Absolute {
        at,
        precision: None,
    };

    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        let millis: i64 = input.parse().ok()?;
        let at = Utc.timestamp_millis_opt(millis).single()?;
        return Some(exact(at.with_timezone(&offset)));
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Some(exact(at));
    }

    for format in [
        "%Y-%m-%d %H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
    ] {
        if let Ok(at) = DateTime::parse_from_str(input, format) {
            return Some(exact(at));
        }
    }

    let local = |naive: NaiveDateTime| naive.and_local_timezone(offset).single();

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return local(naive).map(exact);
        }
    }

    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return local(naive).map(|at| Anchor::Absolute {
                at,
                precision: Some(TimeUnit::Minute),
            });
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return local(date.and_hms_opt(0, 0, 0)?).map(|at| Anchor::Absolute {
            at,
            precision: Some(TimeUnit::Day),
        });
    }

    None
}

fn parse_math_op(input: &str) -> IResult<&str, DateMathOp> {
    alt((parse_round, parse_shift))(input)
}

/// Parse rounding like "/d"
fn parse_round(input: &str) -> IResult<&str, DateMathOp> {
    map(preceded(char('/'), parse_unit), DateMathOp::Round)(input)
}

/// Parse a shift like "-1h", "+2d" or "-w"
fn parse_shift(input: &str) -> IResult<&str, DateMathOp> {
    let (input, sign) = one_of("+-")(input)?;
    let (input, amount) = opt(map_res(digit1, |s: &str| s.parse::<i64>()))(input)?;
    let (input, unit) = parse_unit(input)?;

    let amount = amount.unwrap_or(1);
    let amount = if sign == '-' { -amount } else { amount };
    Ok((input, DateMathOp::Shift { amount, unit }))
}

fn parse_unit(input: &str) -> IResult<&str, TimeUnit> {
    alt((
        value(TimeUnit::Year, char('y')),
        value(TimeUnit::Month, char('M')),
        value(TimeUnit::Week, char('w')),
        value(TimeUnit::Day, char('d')),
        value(TimeUnit::Hour, char('h')),
        value(TimeUnit::Minute, char('m')),
        value(TimeUnit::Second, char('s')),
    ))(input)
}

fn shift(time: DateTime<FixedOffset>, amount: i64, unit: TimeUnit) -> Option<DateTime<FixedOffset>> {
    match unit {
        TimeUnit::Year => shift_months(time, amount.checked_mul(12)?),
        TimeUnit::Month => shift_months(time, amount),
        TimeUnit::Week => time.checked_add_signed(Duration::try_weeks(amount)?),
        TimeUnit::Day => time.checked_add_signed(Duration::try_days(amount)?),
        TimeUnit::Hour => time.checked_add_signed(Duration::try_hours(amount)?),
        TimeUnit::Minute => time.checked_add_signed(Duration::try_minutes(amount)?),
        TimeUnit::Second => time.checked_add_signed(Duration::try_seconds(amount)?),
    }
}

fn shift_months(time: DateTime<FixedOffset>, months: i64) -> Option<DateTime<FixedOffset>> {
    let count = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        time.checked_add_months(count)
    } else {
        time.checked_sub_months(count)
    }
}

fn round(time: DateTime<FixedOffset>, unit: TimeUnit, round_up: bool) -> Option<DateTime<FixedOffset>> {
    let start = start_of(time, unit)?;
    if !round_up {
        return Some(start);
    }
    shift(start, 1, unit)?.checked_sub_signed(Duration::milliseconds(1))
}

fn start_of(time: DateTime<FixedOffset>, unit: TimeUnit) -> Option<DateTime<FixedOffset>> {
    let date = time.date_naive();
    let naive = match unit {
        TimeUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?.and_hms_opt(0, 0, 0)?,
        TimeUnit::Month => {
            NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.and_hms_opt(0, 0, 0)?
        }
        TimeUnit::Week => {
            let back = Duration::days(i64::from(date.weekday().num_days_from_monday()));
            date.checked_sub_signed(back)?.and_hms_opt(0, 0, 0)?
        }
        TimeUnit::Day => date.and_hms_opt(0, 0, 0)?,
        TimeUnit::Hour => date.and_hms_opt(time.hour(), 0, 0)?,
        TimeUnit::Minute => date.and_hms_opt(time.hour(), time.minute(), 0)?,
        TimeUnit::Second => date.and_hms_opt(time.hour(), time.minute(), time.second())?,
    };
    naive.and_local_timezone(*time.offset()).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-15T13:27:45.123Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn utc(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn resolve(expr: &str, round_up: bool) -> TimeResult<DateTime<FixedOffset>> {
        TimeResolver::utc().resolve_at(expr, round_up, now())
    }

    #[test]
    fn test_now() {
        assert_eq!(resolve("now", false).unwrap(), now());
        assert_eq!(resolve("now", true).unwrap(), now());
    }

    #[test]
    fn test_shift_without_rounding_ignores_round_up() {
        let expected = utc("2024-03-15T12:27:45.123Z");
        assert_eq!(resolve("now-1h", false).unwrap(), expected);
        assert_eq!(resolve("now-1h", true).unwrap(), expected);
        assert_eq!(resolve("now-h", false).unwrap(), expected);
    }

    #[test]
    fn test_calendar_shifts() {
        assert_eq!(
            resolve("now-1M", false).unwrap(),
            utc("2024-02-15T13:27:45.123Z")
        );
        assert_eq!(
            resolve("now+2d", false).unwrap(),
            utc("2024-03-17T13:27:45.123Z")
        );
        assert_eq!(
            resolve("now-1w", false).unwrap(),
            utc("2024-03-08T13:27:45.123Z")
        );
        assert_eq!(
            resolve("now-90m", false).unwrap(),
            utc("2024-03-15T11:57:45.123Z")
        );
    }

    #[test]
    fn test_round_day() {
        assert_eq!(
            resolve("now/d", false).unwrap(),
            utc("2024-03-15T00:00:00Z")
        );
        assert_eq!(
            resolve("now/d", true).unwrap(),
            utc("2024-03-15T23:59:59.999Z")
        );
        assert_eq!(
            resolve("now-1d/d", true).unwrap(),
            utc("2024-03-14T23:59:59.999Z")
        );
    }

    #[test]
    fn test_round_week_starts_monday() {
        // 2024-03-15 is a Friday
        assert_eq!(
            resolve("now/w", false).unwrap(),
            utc("2024-03-11T00:00:00Z")
        );
        assert_eq!(
            resolve("now/w", true).unwrap(),
            utc("2024-03-17T23:59:59.999Z")
        );
    }

    #[test]
    fn test_round_year_and_month() {
        assert_eq!(
            resolve("now-1y/y", false).unwrap(),
            utc("2023-01-01T00:00:00Z")
        );
        assert_eq!(
            resolve("now/M", true).unwrap(),
            utc("2024-03-31T23:59:59.999Z")
        );
    }

    #[test]
    fn test_absolute_timestamps() {
        assert_eq!(
            resolve("2024-01-15 10:30:00+0100", false).unwrap(),
            utc("2024-01-15T09:30:00Z")
        );
        assert_eq!(
            resolve("2024-01-15T10:30:00Z", true).unwrap(),
            utc("2024-01-15T10:30:00Z")
        );
        assert_eq!(
            resolve("1705314600000", false).unwrap(),
            utc("2024-01-15T10:30:00Z")
        );
    }

    #[test]
    fn test_date_only_rounds_to_implied_day() {
        assert_eq!(
            resolve("2024-01-15", false).unwrap(),
            utc("2024-01-15T00:00:00Z")
        );
        assert_eq!(
            resolve("2024-01-15", true).unwrap(),
            utc("2024-01-15T23:59:59.999Z")
        );
        assert_eq!(
            resolve("2024-01-15 10:30", true).unwrap(),
            utc("2024-01-15T10:30:59.999Z")
        );
    }

    #[test]
    fn test_absolute_with_math() {
        assert_eq!(
            resolve("2024-01-15||+1d/d", false).unwrap(),
            utc("2024-01-16T00:00:00Z")
        );
    }

    #[test]
    fn test_formatted_output_parses_back() {
        let resolved = resolve("now-6h", false).unwrap();
        let text = format_timestamp(&resolved, DEFAULT_TIMESTAMP_FORMAT);
        assert_eq!(text, "2024-03-15 07:27:45+0000");
        assert_eq!(
            resolve(&text, false).unwrap(),
            utc("2024-03-15T07:27:45Z")
        );
    }

    #[test]
    fn test_offset_rounding() {
        let resolver = TimeResolver::new(parse_utc_offset("+02:00").unwrap());
        let late = utc("2024-03-15T23:30:00Z").with_timezone(&Utc);
        let start = resolver.resolve_at("now/d", false, late).unwrap();
        assert_eq!(start, utc("2024-03-15T22:00:00Z"));
        assert_eq!(start.to_rfc3339(), "2024-03-16T00:00:00+02:00");
    }

    #[test]
    fn test_deterministic_within_same_instant() {
        let resolver = TimeResolver::utc();
        let at = now();
        for expr in ["now-1h", "now-6h", "now-24h", "now-1d", "now-7d"] {
            for round_up in [false, true] {
                assert_eq!(
                    resolver.resolve_at(expr, round_up, at).unwrap(),
                    resolver.resolve_at(expr, round_up, at).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_invalid_expressions() {
        for expr in ["", "   ", "yesterday", "now-1x", "now+", "now/2d", "now-1h junk", "nowhere"] {
            let err = resolve(expr, false).unwrap_err();
            assert!(
                matches!(err, TimeError::InvalidExpression { .. }),
                "{expr:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_out_of_range() {
        let err = resolve("now+999999999999y", false).unwrap_err();
        assert!(matches!(err, TimeError::OutOfRange { .. }));
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("+02:00").unwrap().local_minus_utc(), 7200);
        assert_eq!(parse_utc_offset("-0530").unwrap().local_minus_utc(), -19800);
        assert_eq!(parse_utc_offset("+01").unwrap().local_minus_utc(), 3600);
        assert!(parse_utc_offset("02:00").is_none());
        assert!(parse_utc_offset("+2:00x").is_none());
    }

    #[test]
    fn test_timestamp_format_validation() {
        assert!(is_valid_timestamp_format(DEFAULT_TIMESTAMP_FORMAT));
        assert!(!is_valid_timestamp_format("%Y-%Q"));
        assert!(!is_valid_timestamp_format(""));
    }

    #[test]
    fn test_parsed_expression_shape() {
        let expr = TimeResolver::utc().parse("now-1d/d").unwrap();
        assert!(expr.is_relative());
        assert_eq!(
            expr.ops(),
            &[
                DateMathOp::Shift {
                    amount: -1,
                    unit: TimeUnit::Day
                },
                DateMathOp::Round(TimeUnit::Day)
            ]
        );
        assert_eq!(TimeUnit::Month.symbol(), 'M');
    }
}
