//! Python number rendering and the format-spec mini-language.

use super::error::{RuntimeError, RuntimeResult};
use super::value::{check_len, Value};

/// `repr(float)`: shortest round-trip digits, scientific outside `1e-4..1e16`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        return python_exponent(&format!("{value:e}"));
    }
    let text = format!("{value}");
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

/// Rust writes `1.5e-5`; Python writes `1.5e-05`.
fn python_exponent(text: &str) -> String {
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text.to_string(),
    }
}

#[derive(Debug, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

fn parse_spec(spec: &str) -> RuntimeResult<FormatSpec> {
    let chars: Vec<char> = spec.chars().collect();
    let mut parsed = FormatSpec::default();
    let mut i = 0;
    let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');

    if chars.len() >= 2 && is_align(chars[1]) {
        parsed.fill = Some(chars[0]);
        parsed.align = Some(chars[1]);
        i = 2;
    } else if chars.first().copied().is_some_and(is_align) {
        parsed.align = Some(chars[0]);
        i = 1;
    }
    if let Some(&c @ ('+' | '-' | ' ')) = chars.get(i) {
        parsed.sign = Some(c);
        i += 1;
    }
    if chars.get(i) == Some(&'#') {
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        parsed.zero = true;
        i += 1;
    }
    let width_start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if i > width_start {
        parsed.width = chars[width_start..i]
            .iter()
            .collect::<String>()
            .parse()
            .unwrap_or(usize::MAX);
        check_len(parsed.width)?;
    }
    if let Some(&c @ (',' | '_')) = chars.get(i) {
        parsed.grouping = Some(c);
        i += 1;
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        let start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == start {
            return Err(RuntimeError::value_error("Format specifier missing precision"));
        }
        let precision = chars[start..i]
            .iter()
            .collect::<String>()
            .parse()
            .unwrap_or(usize::MAX);
        parsed.precision = Some(check_len(precision)?);
    }
    if let Some(&c) = chars.get(i) {
        parsed.kind = Some(c);
        i += 1;
    }
    if i != chars.len() {
        return Err(RuntimeError::value_error(format!(
            "Invalid format specifier '{spec}'"
        )));
    }
    Ok(parsed)
}

/// Applies a format spec the way `format(value, spec)` does.
pub fn apply_format_spec(value: &Value, spec: &str) -> RuntimeResult<String> {
    if spec.is_empty() {
        return Ok(value.to_display());
    }
    let spec = parse_spec(spec)?;

    let (body, numeric) = match (spec.kind, value) {
        (Some('s') | None, Value::Str(text)) => {
            let text: String = match spec.precision {
                Some(limit) => text.chars().take(limit).collect(),
                None => text.to_string(),
            };
            (text, false)
        }
        (Some('d'), _) | (None, Value::Int(_))
            if value.as_int().is_some() && spec.precision.is_none() =>
        {
            let int = value.as_int().unwrap_or_default();
            (group_digits(&int.unsigned_abs().to_string(), spec.grouping), true)
        }
        (Some(kind @ ('x' | 'X' | 'b' | 'o')), _) => {
            let int = value.as_int().ok_or_else(|| kind_mismatch(kind, value))?;
            let magnitude = int.unsigned_abs();
            let digits = match kind {
                'x' => format!("{magnitude:x}"),
                'X' => format!("{magnitude:X}"),
                'b' => format!("{magnitude:b}"),
                _ => format!("{magnitude:o}"),
            };
            (digits, true)
        }
        (Some(kind @ ('f' | 'F' | 'e' | 'E' | '%' | 'g' | 'G')), _) | (Some(kind @ 'n'), _) => {
            let float = value.as_float().ok_or_else(|| kind_mismatch(kind, value))?;
            (float_body(float.abs(), kind, spec.precision, spec.grouping), true)
        }
        (None, Value::Float(float)) => {
            let body = match spec.precision {
                Some(_) => float_body(float.abs(), 'g', spec.precision, spec.grouping),
                None => {
                    let text = format_float(float.abs());
                    match spec.grouping {
                        Some(sep) => group_float(&text, sep),
                        None => text,
                    }
                }
            };
            (body, true)
        }
        (None, other) => (other.to_display(), false),
        (Some(kind), other) => return Err(kind_mismatch(kind, other)),
    };

    let negative = numeric && value.as_float().is_some_and(|f| f.is_sign_negative() && f != 0.0);
    let sign = if negative {
        "-"
    } else if numeric {
        match spec.sign {
            Some('+') => "+",
            Some(' ') => " ",
            _ => "",
        }
    } else {
        ""
    };

    Ok(pad(sign, &body, &spec, numeric))
}

fn kind_mismatch(kind: char, value: &Value) -> RuntimeError {
    RuntimeError::value_error(format!(
        "Unknown format code '{kind}' for object of type '{}'",
        value.type_name()
    ))
}

fn float_body(magnitude: f64, kind: char, precision: Option<usize>, grouping: Option<char>) -> String {
    let body = match kind {
        'f' | 'F' => format!("{:.*}", precision.unwrap_or(6), magnitude),
        'e' | 'E' => {
            let text = python_exponent(&format!("{:.*e}", precision.unwrap_or(6), magnitude));
            if kind == 'E' { text.to_uppercase() } else { text }
        }
        '%' => format!("{:.*}%", precision.unwrap_or(6), magnitude * 100.0),
        _ => general_format(magnitude, precision.unwrap_or(6)),
    };
    match grouping {
        Some(sep) if kind != 'e' && kind != 'E' => group_float(&body, sep),
        _ => body,
    }
}

/// `g` formatting: significant digits, trailing zeros trimmed.
fn general_format(magnitude: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if magnitude == 0.0 {
        return "0".to_string();
    }
    if !magnitude.is_finite() {
        return format_float(magnitude);
    }
    let exponent = magnitude.log10().floor() as i32;
    let text = if exponent < -4 || exponent >= precision as i32 {
        python_exponent(&format!("{:.*e}", precision - 1, magnitude))
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        format!("{magnitude:.decimals$}")
    };
    trim_fraction(&text)
}

fn trim_fraction(text: &str) -> String {
    let (mantissa, exponent) = match text.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, Some(exponent)),
        None => (text, None),
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.')
    } else {
        mantissa
    };
    match exponent {
        Some(exponent) => format!("{mantissa}e{exponent}"),
        None => mantissa.to_string(),
    }
}

fn group_digits(digits: &str, grouping: Option<char>) -> String {
    let Some(sep) = grouping else {
        return digits.to_string();
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(sep);
        }
        out.push(ch);
    }
    out
}

fn group_float(text: &str, sep: char) -> String {
    match text.split_once('.') {
        Some((int, frac)) => format!("{}.{frac}", group_digits(int, Some(sep))),
        None => match text.strip_suffix('%') {
            Some(int) => format!("{}%", group_digits(int, Some(sep))),
            None => group_digits(text, Some(sep)),
        },
    }
}

fn pad(sign: &str, body: &str, spec: &FormatSpec, numeric: bool) -> String {
    let len = sign.chars().count() + body.chars().count();
    if len >= spec.width {
        return format!("{sign}{body}");
    }
    let padding = spec.width - len;
    let (fill, align) = if spec.zero && spec.align.is_none() && numeric {
        ('0', '=')
    } else {
        (
            spec.fill.unwrap_or(' '),
            spec.align.unwrap_or(if numeric { '>' } else { '<' }),
        )
    };
    let fill_str = |count: usize| std::iter::repeat_n(fill, count).collect::<String>();
    match align {
        '<' => format!("{sign}{body}{}", fill_str(padding)),
        '^' => {
            let left = padding / 2;
            format!("{}{sign}{body}{}", fill_str(left), fill_str(padding - left))
        }
        '=' => format!("{sign}{}{body}", fill_str(padding)),
        _ => format!("{}{sign}{body}", fill_str(padding)),
    }
}

/// `str.format` with `{}`, `{0}`, `{name}`, attribute-free fields and format specs.
pub fn str_format(template: &str, args: &[Value], kwargs: &[(String, Value)]) -> RuntimeResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto_index = 0usize;

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    field.push(next);
                }
                if !closed {
                    return Err(RuntimeError::value_error("Single '{' encountered in format string"));
                }
                let (name, spec) = field.split_once(':').unwrap_or((field.as_str(), ""));
                let (name, conversion) = match name.split_once('!') {
                    Some((name, conversion)) => (name, conversion.chars().next()),
                    None => (name, None),
                };
                let value = if name.is_empty() {
                    let value = args.get(auto_index).cloned();
                    auto_index += 1;
                    value
                } else if let Ok(index) = name.parse::<usize>() {
                    args.get(index).cloned()
                } else {
                    kwargs
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| value.clone())
                };
                let value = value.ok_or_else(|| {
                    RuntimeError::index_error(format!(
                        "Replacement index {name} out of range for positional args tuple"
                    ))
                })?;
                let value = match conversion {
                    Some('r') => Value::str(value.repr()),
                    Some('s') => Value::str(value.to_display()),
                    _ => value,
                };
                out.push_str(&apply_format_spec(&value, spec)?);
            }
            '}' => {
                return Err(RuntimeError::value_error("Single '}' encountered in format string"));
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// printf-style `template % args`.
pub fn percent_format(template: &str, args: &Value) -> RuntimeResult<String> {
    let values: Vec<Value> = match args {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    let mut values = values.into_iter();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let mut spec = String::new();
        let mut kind = None;
        for next in chars.by_ref() {
            if next.is_ascii_alphabetic() || next == '%' {
                kind = Some(next);
                break;
            }
            spec.push(next);
        }
        let kind = kind.ok_or_else(|| RuntimeError::value_error("incomplete format"))?;
        if kind == '%' {
            out.push('%');
            continue;
        }
        let value = values
            .next()
            .ok_or_else(|| RuntimeError::type_error("not enough arguments for format string"))?;
        let rendered = match kind {
            's' => apply_format_spec(&Value::str(value.to_display()), &align_left(&spec))?,
            'r' => apply_format_spec(&Value::str(value.repr()), &align_left(&spec))?,
            'd' | 'i' | 'u' => {
                let int = match &value {
                    Value::Float(f) => Value::Int(f.trunc() as i64),
                    other => other.clone(),
                };
                apply_format_spec(&int, &format!("{}d", align_left(&spec)))?
            }
            other => apply_format_spec(&value, &format!("{}{other}", align_left(&spec)))?,
        };
        out.push_str(&rendered);
    }
    if values.next().is_some() {
        return Err(RuntimeError::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(out)
}

/// printf `-` flag means left alignment.
fn align_left(spec: &str) -> String {
    match spec.strip_prefix('-') {
        Some(rest) => format!("<{rest}"),
        None => spec.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_repr_matches_python() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(-0.5), "-0.5");
    }

    #[test]
    fn format_specs_cover_common_cases() {
        assert_eq!(apply_format_spec(&Value::Float(3.14159), ".2f").unwrap(), "3.14");
        assert_eq!(apply_format_spec(&Value::Int(1234567), ",").unwrap(), "1,234,567");
        assert_eq!(apply_format_spec(&Value::Int(42), "05d").unwrap(), "00042");
        assert_eq!(apply_format_spec(&Value::str("ab"), ">4").unwrap(), "  ab");
        assert_eq!(apply_format_spec(&Value::Float(0.256), ".1%").unwrap(), "25.6%");
        assert_eq!(apply_format_spec(&Value::Float(-2.5), "+.1f").unwrap(), "-2.5");
        assert_eq!(apply_format_spec(&Value::Float(1234.5), ",.2f").unwrap(), "1,234.50");
    }

    #[test]
    fn str_format_supports_auto_and_named_fields() {
        let rendered = str_format(
            "{} + {1} = {total:.1f}",
            &[Value::Int(1), Value::Int(2)],
            &[("total".to_string(), Value::Float(3.0))],
        )
        .unwrap();
        assert_eq!(rendered, "1 + 2 = 3.0");
    }

    #[test]
    fn percent_format_handles_tuples() {
        let args = Value::tuple(vec![Value::str("x"), Value::Float(1.5)]);
        assert_eq!(percent_format("%s=%.2f", &args).unwrap(), "x=1.50");
    }
}
