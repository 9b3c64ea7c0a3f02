//! Recursive-descent parser for unit expressions.
//!
//! Grammar (loosely pint's): `*`, `/`, and the word `per` combine terms;
//! adjacency is multiplication (`100ml`); `**` and `^` raise to integer
//! powers; digits glued to a symbol are an exponent unless the whole token
//! is a registered unit, so `cm3` is cm cubed while `SiO2` and `H2O` stay
//! atomic. Offset temperature scales are only valid as the entire
//! expression.

use crate::error::{HarmonizeError, Result};
use crate::units::dimension::Dimension;
use crate::units::registry::UnitRegistry;

/// A unit expression reduced to scale factor, dimension, and temperature
/// offset (internal = value * factor + offset; offset is nonzero only for
/// standalone temperature scales).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedUnit {
    pub factor: f64,
    pub dimension: Dimension,
    pub offset: f64,
}

impl ParsedUnit {
    pub fn dimensionless(factor: f64) -> Self {
        Self {
            factor,
            dimension: Dimension::NONE,
            offset: 0.0,
        }
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dimension.is_dimensionless()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Symbol(String),
    Star,
    Slash,
    Caret,
    Minus,
    LParen,
    RParen,
}

/// Parses unit expressions against a registry.
pub struct UnitParser<'r> {
    registry: &'r UnitRegistry,
}

impl<'r> UnitParser<'r> {
    pub fn new(registry: &'r UnitRegistry) -> Self {
        Self { registry }
    }

    pub fn parse(&self, input: &str) -> Result<ParsedUnit> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(HarmonizeError::UnitParse {
                input: input.to_string(),
                reason: "empty unit expression".to_string(),
            });
        }
        let mut cursor = Cursor {
            input,
            tokens,
            pos: 0,
            registry: self.registry,
        };
        let unit = cursor.expression()?;
        if !cursor.at_end() {
            return Err(cursor.error("unexpected trailing tokens"));
        }
        Ok(unit)
    }
}

impl UnitRegistry {
    /// Parses a unit expression against this registry.
    pub fn parse_unit(&self, input: &str) -> Result<ParsedUnit> {
        UnitParser::new(self).parse(input)
    }
}

struct Cursor<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    registry: &'a UnitRegistry,
}

impl Cursor<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, reason: impl Into<String>) -> HarmonizeError {
        HarmonizeError::UnitParse {
            input: self.input.to_string(),
            reason: reason.into(),
        }
    }

    /// expression := term ((STAR | SLASH | "per" | adjacency) term)*
    fn expression(&mut self) -> Result<ParsedUnit> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    acc = self.multiply(acc, rhs)?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    acc = self.divide(acc, rhs)?;
                }
                Some(Token::Symbol(s)) if s == "per" => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    acc = self.divide(acc, rhs)?;
                }
                // Adjacent factor means multiplication.
                Some(Token::Number(_)) | Some(Token::Symbol(_)) | Some(Token::LParen) => {
                    let rhs = self.term()?;
                    acc = self.multiply(acc, rhs)?;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    /// term := factor ((CARET | "**") integer)?
    fn term(&mut self) -> Result<ParsedUnit> {
        let base = self.factor()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.pos += 1;
            let exp = self.exponent()?;
            return self.pow(base, exp);
        }
        Ok(base)
    }

    fn exponent(&mut self) -> Result<i32> {
        let negative = if matches!(self.peek(), Some(Token::Minus)) {
            self.pos += 1;
            true
        } else {
            false
        };
        match self.advance() {
            Some(Token::Number(v)) if v.fract() == 0.0 => {
                let exp = v as i32;
                Ok(if negative { -exp } else { exp })
            }
            Some(Token::Number(_)) => Err(self.error("non-integer exponent")),
            _ => Err(self.error("expected exponent after '**'")),
        }
    }

    fn factor(&mut self) -> Result<ParsedUnit> {
        match self.advance() {
            Some(Token::Number(v)) => Ok(ParsedUnit::dimensionless(v)),
            Some(Token::Symbol(s)) => self.symbol_unit(&s),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("unbalanced parenthesis")),
                }
            }
            Some(Token::Minus) => Err(self.error("unexpected '-'")),
            Some(Token::Star) | Some(Token::Slash) | Some(Token::Caret)
            | Some(Token::RParen) => Err(self.error("expected a unit or number")),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    /// Resolves one symbol, trying the whole token first so registered units
    /// with digits (`SiO2`, `H2O`) stay atomic, then digit-suffix exponents
    /// (`cm3` as cm**3).
    fn symbol_unit(&self, symbol: &str) -> Result<ParsedUnit> {
        if let Some(info) = self.registry.resolve(symbol) {
            return Ok(ParsedUnit {
                factor: info.factor,
                dimension: info.dimension,
                offset: info.offset,
            });
        }
        let trailing_digits = symbol
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if trailing_digits > 0 && trailing_digits < symbol.len() {
            let split = symbol.len() - trailing_digits;
            let (base, digits) = symbol.split_at(split);
            if let Some(info) = self.registry.resolve(base) {
                let exp: i32 = digits.parse().map_err(|_| self.error("bad exponent"))?;
                let unit = ParsedUnit {
                    factor: info.factor,
                    dimension: info.dimension,
                    offset: info.offset,
                };
                return self.pow(unit, exp);
            }
        }
        Err(HarmonizeError::UndefinedUnit(symbol.to_string()))
    }

    fn multiply(&self, lhs: ParsedUnit, rhs: ParsedUnit) -> Result<ParsedUnit> {
        self.reject_offset(&lhs)?;
        self.reject_offset(&rhs)?;
        Ok(ParsedUnit {
            factor: lhs.factor * rhs.factor,
            dimension: lhs.dimension + rhs.dimension,
            offset: 0.0,
        })
    }

    fn divide(&self, lhs: ParsedUnit, rhs: ParsedUnit) -> Result<ParsedUnit> {
        self.reject_offset(&lhs)?;
        self.reject_offset(&rhs)?;
        if rhs.factor == 0.0 {
            return Err(self.error("division by zero"));
        }
        Ok(ParsedUnit {
            factor: lhs.factor / rhs.factor,
            dimension: lhs.dimension - rhs.dimension,
            offset: 0.0,
        })
    }

    fn pow(&self, base: ParsedUnit, exp: i32) -> Result<ParsedUnit> {
        if exp != 1 {
            self.reject_offset(&base)?;
        }
        Ok(ParsedUnit {
            factor: base.factor.powi(exp),
            dimension: base.dimension.pow(exp),
            offset: base.offset,
        })
    }

    fn reject_offset(&self, unit: &ParsedUnit) -> Result<()> {
        if unit.offset != 0.0 {
            return Err(HarmonizeError::OffsetUnit(self.input.to_string()));
        }
        Ok(())
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Caret);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '\u{00b7}' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let (value, next) = scan_number(&chars, i).ok_or_else(|| {
                    HarmonizeError::UnitParse {
                        input: input.to_string(),
                        reason: "malformed number".to_string(),
                    }
                })?;
                tokens.push(Token::Number(value));
                i = next;
            }
            c if is_symbol_start(c) => {
                let start = i;
                i += 1;
                while i < chars.len() && is_symbol_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Symbol(chars[start..i].iter().collect()));
            }
            other => {
                return Err(HarmonizeError::UnitParse {
                    input: input.to_string(),
                    reason: format!("unexpected character '{other}'"),
                });
            }
        }
    }
    Ok(tokens)
}

fn is_symbol_start(c: char) -> bool {
    c.is_alphabetic() || c == '%' || c == '_' || c == '\u{00b5}' || c == '\u{03bc}'
}

fn is_symbol_char(c: char) -> bool {
    is_symbol_start(c) || c.is_ascii_digit()
}

/// Scans a number at `start`, consuming a trailing exponent only when it
/// actually looks like one (`1e-2` yes, the `e` of `1 each` no).
fn scan_number(chars: &[char], start: usize) -> Option<(f64, usize)> {
    let mut i = start;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    let text: String = chars[start..i].iter().collect();
    text.parse().ok().map(|v| (v, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> UnitRegistry {
        UnitRegistry::standard()
    }

    #[test]
    fn test_simple_ratio() {
        let unit = registry().parse_unit("mg/l").unwrap();
        assert!((unit.factor - 1e-3).abs() < 1e-12);
        assert_eq!(unit.dimension, Dimension::DENSITY);
        assert_eq!(unit.offset, 0.0);
    }

    #[test]
    fn test_numeric_factor_in_parentheses() {
        let mut reg = registry();
        reg.define("Colony_Forming_Units = [] = CFU = cfu").unwrap();
        let unit = reg.parse_unit("CFU/(100ml)").unwrap();
        // 100 ml = 1e-4 m**3.
        assert!((unit.factor - 1e4).abs() < 1e-6);
        assert_eq!(unit.dimension, Dimension::LENGTH.pow(-3));
        // Lowercase alias parses the same way.
        assert_eq!(reg.parse_unit("cfu/(100ml)").unwrap(), unit);
    }

    #[test]
    fn test_digit_suffix_exponent() {
        let reg = registry();
        let explicit = reg.parse_unit("mg/cm**3").unwrap();
        let suffixed = reg.parse_unit("mg/cm3").unwrap();
        assert_eq!(explicit, suffixed);
        assert_eq!(explicit.dimension, Dimension::DENSITY);
    }

    #[test]
    fn test_registered_unit_with_digits_stays_atomic() {
        let mut reg = registry();
        reg.define("SiO2 = []").unwrap();
        let unit = reg.parse_unit("SiO2").unwrap();
        assert!(unit.is_dimensionless());
        assert_eq!(unit.factor, 1.0);
        // H2O resolves to the water density unit, not H squared * O.
        let water = reg.parse_unit("H2O").unwrap();
        assert_eq!(water.dimension, Dimension::DENSITY);
        assert_eq!(water.factor, 1000.0);
    }

    #[test]
    fn test_undefined_symbol_errors() {
        let reg = registry();
        assert!(matches!(
            reg.parse_unit("SiO2"),
            Err(HarmonizeError::UndefinedUnit(s)) if s == "SiO2"
        ));
        // "as" resolves as attosecond through the prefix fallback (pint has
        // the same quirk); the parse fails at "P" instead.
        assert!(matches!(
            reg.parse_unit("mg/l as P"),
            Err(HarmonizeError::UndefinedUnit(s)) if s == "P"
        ));
    }

    #[test]
    fn test_offset_unit_standalone_only() {
        let reg = registry();
        let degc = reg.parse_unit("degC").unwrap();
        assert_eq!(degc.offset, 273.15);
        assert!(matches!(
            reg.parse_unit("degC/day"),
            Err(HarmonizeError::OffsetUnit(_))
        ));
        assert!(matches!(
            reg.parse_unit("degC**2"),
            Err(HarmonizeError::OffsetUnit(_))
        ));
    }

    #[test]
    fn test_per_and_explicit_operators_agree() {
        let reg = registry();
        let slash = reg.parse_unit("m/s").unwrap();
        let per = reg.parse_unit("m per s").unwrap();
        let star = reg.parse_unit("m * s**-1").unwrap();
        assert_eq!(slash, per);
        assert_eq!(slash, star);
    }

    #[test]
    fn test_bare_number_expression() {
        let unit = registry().parse_unit("1e-3").unwrap();
        assert!(unit.is_dimensionless());
        assert_eq!(unit.factor, 1e-3);
    }

    #[test]
    fn test_division_by_zero_rejected() {
        assert!(matches!(
            registry().parse_unit("0/00"),
            Err(HarmonizeError::UnitParse { .. })
        ));
    }

    #[test]
    fn test_malformed_expressions_rejected() {
        let reg = registry();
        assert!(reg.parse_unit("").is_err());
        assert!(reg.parse_unit("mg/(l").is_err());
        assert!(reg.parse_unit("mg l)").is_err());
        assert!(reg.parse_unit("mg//l").is_err());
        assert!(reg.parse_unit("mg@25").is_err());
    }

    #[test]
    fn test_micro_sign_in_expression() {
        let reg = registry();
        let micro_sign = reg.parse_unit("\u{00b5}S/cm").unwrap();
        let ascii = reg.parse_unit("uS/cm").unwrap();
        assert_eq!(micro_sign, ascii);
    }
}
