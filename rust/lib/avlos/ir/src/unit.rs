//! Physical units and quantities.
//!
//! A process-wide [`UnitRegistry`] is created lazily on first use (see
//! [`registry`]). It knows the SI base and derived units, a handful of common
//! non-SI units, SI prefixes, and the device-specific angular `tick`
//! (1/8192 of a full turn).
//!
//! Units are purely multiplicative: a unit is a scale factor relative to the
//! coherent SI unit of its dimension. Angle is tracked as its own base
//! dimension so that e.g. `tick/second` and `volt` are never confused.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;
use std::ops::{Div, Mul};
use std::sync::OnceLock;

use thiserror::Error;

/// Number of base dimensions tracked by [`Dimension`].
const BASE_COUNT: usize = 8;

const BASE_NAMES: [&str; BASE_COUNT] = [
    "length",
    "mass",
    "time",
    "current",
    "temperature",
    "substance",
    "luminosity",
    "angle",
];

/// Steps per full turn of the device-specific angular unit.
pub const TICKS_PER_TURN: f64 = 8192.0;

/// Exponents of the base dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimension([i8; BASE_COUNT]);

impl Dimension {
    pub const NONE: Dimension = Dimension([0; BASE_COUNT]);
    pub const LENGTH: Dimension = Dimension::base(0);
    pub const MASS: Dimension = Dimension::base(1);
    pub const TIME: Dimension = Dimension::base(2);
    pub const CURRENT: Dimension = Dimension::base(3);
    pub const TEMPERATURE: Dimension = Dimension::base(4);
    pub const SUBSTANCE: Dimension = Dimension::base(5);
    pub const LUMINOSITY: Dimension = Dimension::base(6);
    pub const ANGLE: Dimension = Dimension::base(7);

    const fn base(index: usize) -> Self {
        let mut exps = [0; BASE_COUNT];
        exps[index] = 1;
        Dimension(exps)
    }

    pub fn is_dimensionless(&self) -> bool {
        *self == Self::NONE
    }

    fn combine(self, other: Self, sign: i8) -> Self {
        let mut exps = self.0;
        for (e, o) in exps.iter_mut().zip(other.0) {
            *e += sign * o;
        }
        Dimension(exps)
    }

    fn powi(self, n: i8) -> Self {
        let mut exps = self.0;
        for e in exps.iter_mut() {
            *e *= n;
        }
        Dimension(exps)
    }
}

impl Mul for Dimension {
    type Output = Dimension;
    fn mul(self, rhs: Self) -> Self {
        self.combine(rhs, 1)
    }
}

impl Div for Dimension {
    type Output = Dimension;
    fn div(self, rhs: Self) -> Self {
        self.combine(rhs, -1)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return f.write_str("dimensionless");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .zip(BASE_NAMES)
            .filter(|(e, _)| **e != 0)
            .map(|(e, name)| {
                if *e == 1 {
                    format!("[{}]", name)
                } else {
                    format!("[{}]^{}", name, e)
                }
            })
            .collect();
        f.write_str(&parts.join(" * "))
    }
}

/// A physical unit: a scale factor relative to the coherent SI unit of its
/// dimension, plus the expression it was written as.
#[derive(Debug, Clone)]
pub struct Unit {
    name: String,
    factor: f64,
    dimension: Dimension,
}

impl Unit {
    pub fn new(name: impl Into<String>, factor: f64, dimension: Dimension) -> Self {
        Self {
            name: name.into(),
            factor,
            dimension,
        }
    }

    pub fn dimensionless() -> Self {
        Self::new("dimensionless", 1.0, Dimension::NONE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Factor that converts a magnitude in `self` into a magnitude in `to`.
    pub fn conversion_factor(&self, to: &Unit) -> Result<f64, UnitConversionError> {
        if !self.is_compatible(to) {
            return Err(UnitConversionError {
                from: self.name.clone(),
                from_dimension: self.dimension.to_string(),
                to: to.name.clone(),
                to_dimension: to.dimension.to_string(),
            });
        }
        if self.factor == to.factor {
            Ok(1.0)
        } else {
            Ok(self.factor / to.factor)
        }
    }

    fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn times(&self, other: &Unit) -> Unit {
        Unit::new(
            format!("{} * {}", self.name, other.name),
            self.factor * other.factor,
            self.dimension * other.dimension,
        )
    }

    fn per(&self, other: &Unit) -> Unit {
        Unit::new(
            format!("{} / {}", self.name, other.name),
            self.factor / other.factor,
            self.dimension / other.dimension,
        )
    }

    fn powi(&self, n: i8) -> Unit {
        Unit::new(
            format!("{} ** {}", self.name, n),
            self.factor.powi(n as i32),
            self.dimension.powi(n),
        )
    }
}

/// Units compare by meaning (scale and dimension), not by spelling.
impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension && self.factor == other.factor
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A magnitude tagged with a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    magnitude: f64,
    unit: Unit,
}

impl Quantity {
    pub fn new(magnitude: f64, unit: Unit) -> Self {
        Self { magnitude, unit }
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Convert to another unit of the same dimension.
    pub fn to(&self, unit: &Unit) -> Result<Quantity, UnitConversionError> {
        let factor = self.unit.conversion_factor(unit)?;
        Ok(Quantity::new(self.magnitude * factor, unit.clone()))
    }

    /// Convert to `unit` and return the bare magnitude.
    pub fn magnitude_in(&self, unit: &Unit) -> Result<f64, UnitConversionError> {
        Ok(self.to(unit)?.magnitude)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.dimension.is_dimensionless() && self.unit.factor == 1.0 {
            write!(f, "{}", self.magnitude)
        } else {
            write!(f, "{} {}", self.magnitude, self.unit)
        }
    }
}

impl Mul<&Unit> for f64 {
    type Output = Quantity;
    fn mul(self, unit: &Unit) -> Quantity {
        Quantity::new(self, unit.clone())
    }
}

impl Mul<Unit> for f64 {
    type Output = Quantity;
    fn mul(self, unit: Unit) -> Quantity {
        Quantity::new(self, unit)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitResolutionError {
    #[error("undefined unit '{name}' in '{expression}'")]
    Undefined { name: String, expression: String },

    #[error("invalid unit expression '{expression}': {message}")]
    Syntax { expression: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot convert from '{from}' ({from_dimension}) to '{to}' ({to_dimension})")]
pub struct UnitConversionError {
    pub from: String,
    pub from_dimension: String,
    pub to: String,
    pub to_dimension: String,
}

/// Errors from parsing a quantity string such as `"12 volt"`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuantityParseError {
    #[error("no numeric magnitude in '{0}'")]
    MissingMagnitude(String),

    #[error(transparent)]
    Unit(#[from] UnitResolutionError),
}

/// Prefix name, prefix symbol, scale.
const PREFIXES: [(&str, &str, f64); 10] = [
    ("giga", "G", 1e9),
    ("mega", "M", 1e6),
    ("kilo", "k", 1e3),
    ("centi", "c", 1e-2),
    ("milli", "m", 1e-3),
    ("micro", "u", 1e-6),
    ("micro", "µ", 1e-6),
    ("nano", "n", 1e-9),
    ("pico", "p", 1e-12),
    ("deci", "d", 1e-1),
];

/// Registry of named units.
#[derive(Debug)]
pub struct UnitRegistry {
    by_name: HashMap<String, Unit>,
    /// Symbols accept symbol prefixes (`mA`); names accept name prefixes (`milliampere`).
    symbols: HashMap<String, String>,
}

impl UnitRegistry {
    /// Build a registry pre-populated with the standard units.
    pub fn with_defaults() -> Self {
        let mut reg = UnitRegistry {
            by_name: HashMap::new(),
            symbols: HashMap::new(),
        };

        use Dimension as D;
        let l = D::LENGTH;
        let m = D::MASS;
        let t = D::TIME;
        let i = D::CURRENT;

        // Base units.
        reg.define("meter", &["m", "metre"], 1.0, l);
        reg.define("gram", &["g"], 1e-3, m);
        reg.define("second", &["s", "sec"], 1.0, t);
        reg.define("ampere", &["A", "amp"], 1.0, i);
        reg.define("kelvin", &["K"], 1.0, D::TEMPERATURE);
        reg.define("mole", &["mol"], 1.0, D::SUBSTANCE);
        reg.define("candela", &["cd"], 1.0, D::LUMINOSITY);
        reg.define("radian", &["rad"], 1.0, D::ANGLE);

        // Derived SI units.
        let force = m * l / (t * t);
        let energy = force * l;
        let power = energy / t;
        let voltage = power / i;
        reg.define("hertz", &["Hz"], 1.0, D::NONE / t);
        reg.define("newton", &["N"], 1.0, force);
        reg.define("joule", &["J"], 1.0, energy);
        reg.define("watt", &["W"], 1.0, power);
        reg.define("volt", &["V"], 1.0, voltage);
        reg.define("ohm", &["Ω"], 1.0, voltage / i);
        reg.define("siemens", &["S"], 1.0, i / voltage);
        reg.define("coulomb", &["C"], 1.0, i * t);
        reg.define("farad", &["F"], 1.0, (i * t) / voltage);
        reg.define("henry", &["H"], 1.0, voltage * t / i);
        reg.define("weber", &["Wb"], 1.0, voltage * t);
        reg.define("tesla", &["T"], 1.0, voltage * t / (l * l));
        reg.define("pascal", &["Pa"], 1.0, force / (l * l));

        // Common non-SI units.
        reg.define("minute", &["min"], 60.0, t);
        reg.define("hour", &["h", "hr"], 3600.0, t);
        reg.define("degree", &["deg"], PI / 180.0, D::ANGLE);
        reg.define("turn", &["revolution", "rev", "cycle"], 2.0 * PI, D::ANGLE);
        reg.define("rpm", &[], 2.0 * PI / 60.0, D::ANGLE / t);
        reg.define("inch", &["in"], 0.0254, l);
        reg.define("percent", &["%"], 0.01, D::NONE);
        reg.define("dimensionless", &["count"], 1.0, D::NONE);

        // Device-specific fixed-point angle.
        reg.define("tick", &["ticks"], 2.0 * PI / TICKS_PER_TURN, D::ANGLE);

        reg
    }

    /// Register a unit under its name and any number of symbols/aliases.
    pub fn define(&mut self, name: &str, symbols: &[&str], factor: f64, dimension: Dimension) {
        self.by_name
            .insert(name.to_string(), Unit::new(name, factor, dimension));
        for sym in symbols {
            self.symbols.insert(sym.to_string(), name.to_string());
        }
    }

    /// Resolve a single unit identifier (no operators).
    fn lookup(&self, ident: &str) -> Option<Unit> {
        if let Some(u) = self.by_name.get(ident) {
            return Some(u.clone());
        }
        if let Some(name) = self.symbols.get(ident) {
            return self.by_name.get(name).map(|u| u.clone().renamed(ident));
        }
        // Prefixed full names: milliampere, kilovolt, ...
        for (pname, _, scale) in PREFIXES {
            if let Some(rest) = ident.strip_prefix(pname) {
                if let Some(u) = self.by_name.get(rest) {
                    return Some(Unit::new(ident, u.factor * scale, u.dimension));
                }
            }
        }
        // Prefixed symbols: mA, kV, us, ...
        for (_, psym, scale) in PREFIXES {
            if let Some(rest) = ident.strip_prefix(psym) {
                if let Some(name) = self.symbols.get(rest) {
                    if let Some(u) = self.by_name.get(name) {
                        return Some(Unit::new(ident, u.factor * scale, u.dimension));
                    }
                }
            }
        }
        // Plurals: volts, seconds, ...
        if ident.len() > 3 {
            if let Some(singular) = ident.strip_suffix('s') {
                if let Some(u) = self.by_name.get(singular) {
                    return Some(u.clone().renamed(ident));
                }
            }
        }
        None
    }

    /// Parse a unit expression such as `volt`, `tick/second`,
    /// `meter/second**2` or `newton * meter`.
    pub fn parse(&self, expression: &str) -> Result<Unit, UnitResolutionError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(UnitResolutionError::Syntax {
                expression: expression.to_string(),
                message: "empty expression".into(),
            });
        }
        let tokens = tokenize(trimmed)?;
        let mut parser = ExprParser {
            registry: self,
            tokens: &tokens,
            pos: 0,
            expression: trimmed,
        };
        let unit = parser.expr()?;
        if parser.pos != tokens.len() {
            return Err(parser.syntax("unexpected trailing input"));
        }
        Ok(unit.renamed(trimmed))
    }

    /// Parse a quantity string such as `"12 volt"` or `"-3.5 tick/second"`.
    /// A bare number parses as a dimensionless quantity.
    pub fn parse_quantity(&self, input: &str) -> Result<Quantity, QuantityParseError> {
        let input = input.trim();
        let (magnitude, rest) = split_magnitude(input)
            .ok_or_else(|| QuantityParseError::MissingMagnitude(input.to_string()))?;
        let unit = if rest.is_empty() {
            Unit::dimensionless()
        } else {
            self.parse(rest)?
        };
        Ok(Quantity::new(magnitude, unit))
    }
}

/// The process-wide unit registry, created on first use.
pub fn registry() -> &'static UnitRegistry {
    static REGISTRY: OnceLock<UnitRegistry> = OnceLock::new();
    REGISTRY.get_or_init(UnitRegistry::with_defaults)
}

/// Longest finite numeric prefix of `input` plus the remainder.
fn split_magnitude(input: &str) -> Option<(f64, &str)> {
    let mut ends: Vec<usize> = input.char_indices().map(|(i, _)| i).skip(1).collect();
    ends.push(input.len());
    ends.into_iter()
        .rev()
        .find_map(|end| {
            let head = &input[..end];
            head.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| (v, input[end..].trim()))
        })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Mul,
    Div,
    Pow,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, UnitResolutionError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expression.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '*' {
            if chars.get(i + 1) == Some(&'*') {
                tokens.push(Token::Pow);
                i += 2;
            } else {
                tokens.push(Token::Mul);
                i += 1;
            }
        } else if c == '^' {
            tokens.push(Token::Pow);
            i += 1;
        } else if c == '/' {
            tokens.push(Token::Div);
            i += 1;
        } else if c.is_ascii_digit() || c == '-' {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value = text.parse().map_err(|_| UnitResolutionError::Syntax {
                expression: expression.to_string(),
                message: format!("invalid number '{}'", text),
            })?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' || c == '%' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphabetic() || chars[i] == '_' || chars[i] == '%')
            {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            return Err(UnitResolutionError::Syntax {
                expression: expression.to_string(),
                message: format!("unexpected character '{}'", c),
            });
        }
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    registry: &'a UnitRegistry,
    tokens: &'a [Token],
    pos: usize,
    expression: &'a str,
}

impl ExprParser<'_> {
    fn syntax(&self, message: &str) -> UnitResolutionError {
        UnitResolutionError::Syntax {
            expression: self.expression.to_string(),
            message: message.to_string(),
        }
    }

    // expr := term (('*' | '/' | <adjacent>) term)*
    fn expr(&mut self) -> Result<Unit, UnitResolutionError> {
        let mut acc = self.term()?;
        loop {
            match self.tokens.get(self.pos) {
                Some(Token::Mul) => {
                    self.pos += 1;
                    acc = acc.times(&self.term()?);
                }
                Some(Token::Div) => {
                    self.pos += 1;
                    acc = acc.per(&self.term()?);
                }
                Some(Token::Ident(_)) | Some(Token::Number(_)) => {
                    acc = acc.times(&self.term()?);
                }
                _ => return Ok(acc),
            }
        }
    }

    // term := factor ('**' number)?
    fn term(&mut self) -> Result<Unit, UnitResolutionError> {
        let base = self.factor()?;
        if self.tokens.get(self.pos) == Some(&Token::Pow) {
            self.pos += 1;
            match self.tokens.get(self.pos) {
                Some(Token::Number(n)) if n.fract() == 0.0 && n.abs() <= 16.0 => {
                    self.pos += 1;
                    return Ok(base.powi(*n as i8));
                }
                _ => return Err(self.syntax("exponent must be a small integer")),
            }
        }
        Ok(base)
    }

    fn factor(&mut self) -> Result<Unit, UnitResolutionError> {
        match self.tokens.get(self.pos) {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                self.registry
                    .lookup(name)
                    .ok_or_else(|| UnitResolutionError::Undefined {
                        name: name.clone(),
                        expression: self.expression.to_string(),
                    })
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Unit::new(n.to_string(), *n, Dimension::NONE))
            }
            _ => Err(self.syntax("expected a unit name")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_fraction_of_turn() {
        let reg = registry();
        let tick = reg.parse("tick").unwrap();
        let turn = reg.parse("turn").unwrap();
        let q = 8192.0 * &tick;
        let in_turns = q.magnitude_in(&turn).unwrap();
        assert!((in_turns - 1.0).abs() < 1e-12);
    }

    #[test]
    fn derived_units_are_consistent() {
        let reg = registry();
        let volt = reg.parse("volt").unwrap();
        let watt_per_amp = reg.parse("watt/ampere").unwrap();
        assert_eq!(volt, watt_per_amp);
        let ohm = reg.parse("ohm").unwrap();
        assert_eq!(ohm, reg.parse("V/A").unwrap());
    }

    #[test]
    fn compound_expressions() {
        let reg = registry();
        let accel = reg.parse("meter/second**2").unwrap();
        assert_eq!(accel.dimension(), Dimension::LENGTH / (Dimension::TIME * Dimension::TIME));
        let rate = reg.parse("tick/second").unwrap();
        assert_eq!(rate.dimension(), Dimension::ANGLE / Dimension::TIME);
        let charge = reg.parse("ampere * second").unwrap();
        assert_eq!(charge, reg.parse("coulomb").unwrap());
        assert_eq!(reg.parse("newton meter").unwrap(), reg.parse("joule").unwrap());
    }

    #[test]
    fn prefixes_scale() {
        let reg = registry();
        let ma = reg.parse("milliampere").unwrap();
        let amp = reg.parse("ampere").unwrap();
        let q = 1500.0 * &ma;
        assert!((q.magnitude_in(&amp).unwrap() - 1.5).abs() < 1e-12);
        assert_eq!(reg.parse("mA").unwrap(), ma);
        assert_eq!(reg.parse("kV").unwrap().factor(), 1e3);
    }

    #[test]
    fn unknown_unit_fails() {
        let err = registry().parse("parsec_per_fortnight").unwrap_err();
        assert!(matches!(err, UnitResolutionError::Undefined { .. }));
        assert!(registry().parse("volt / ").is_err());
        assert!(registry().parse("").is_err());
    }

    #[test]
    fn incompatible_conversion_fails() {
        let reg = registry();
        let q = 3.0 * reg.parse("volt").unwrap();
        let err = q.to(&reg.parse("ampere").unwrap()).unwrap_err();
        assert_eq!(err.from, "volt");
        assert_eq!(err.to, "ampere");
    }

    #[test]
    fn quantity_strings() {
        let reg = registry();
        let q = reg.parse_quantity("12 volt").unwrap();
        assert_eq!(q.magnitude(), 12.0);
        assert_eq!(q.unit(), &reg.parse("V").unwrap());
        assert_eq!(q.to_string(), "12 volt");

        let q = reg.parse_quantity("-2.5e3 tick/second").unwrap();
        assert_eq!(q.magnitude(), -2500.0);

        let q = reg.parse_quantity("7").unwrap();
        assert!(q.unit().dimension().is_dimensionless());
        assert_eq!(q.to_string(), "7");

        assert!(reg.parse_quantity("volt").is_err());
    }

    #[test]
    fn non_finite_magnitudes_rejected() {
        let reg = registry();
        for input in ["inf volt", "-inf volt", "NaN volt", "infinity", "nanovolt"] {
            assert!(
                matches!(
                    reg.parse_quantity(input),
                    Err(QuantityParseError::MissingMagnitude(_))
                ),
                "{}",
                input
            );
        }
        assert_eq!(reg.parse_quantity("1e308 volt").unwrap().magnitude(), 1e308);
    }
}
