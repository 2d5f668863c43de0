//! Value rendering: every observable textual form of a value goes
//! through here.

use num_traits::Signed;

use crate::value::{ObjectMap, Value};

/// Rendering configuration, snapshotted from the active settings.
#[derive(Copy, Clone, Debug, Default)]
pub struct RenderConfig {
    /// Quote and escape top-level strings. Strings nested inside
    /// collections are always quoted.
    pub quote_strings: bool,
    /// Thousands separators in integer digit runs.
    pub separators: bool,
    /// Pretty-print collections across lines at this indent width.
    pub indent: Option<usize>,
}

impl RenderConfig {
    /// Bare text: no quoting, no separators, single line.
    pub fn plain() -> Self {
        RenderConfig::default()
    }
}

/// Render a value to its canonical text.
pub fn render(value: &Value, config: &RenderConfig) -> String {
    render_at(value, config, 0, false)
}

fn render_at(value: &Value, config: &RenderConfig, depth: usize, nested: bool) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(n) => {
            let text = n.to_string();
            if config.separators {
                separate_thousands(&text)
            } else {
                text
            }
        }
        Value::Decimal(d) => {
            let text = d.normalized().to_string();
            if config.separators {
                separate_thousands(&text)
            } else {
                text
            }
        }
        Value::Fraction(r) => {
            if r.is_negative() {
                format!("-{}/{}", r.numer().magnitude(), r.denom().magnitude())
            } else {
                format!("{}/{}", r.numer(), r.denom())
            }
        }
        Value::Complex(z) => z.to_string(),
        Value::Quaternion(q) => q.to_string(),
        Value::ContinuedFraction(cf) => cf.to_string(),
        Value::Str(s) => {
            if config.quote_strings || nested {
                quote(s)
            } else {
                s.clone()
            }
        }
        Value::Array(a) => {
            let items = a.borrow();
            render_list(items.iter(), "[", "]", config, depth)
        }
        Value::Set(s) => {
            let items = s.borrow();
            render_list(items.iter(), "{", "}", config, depth)
        }
        Value::Object(o) => render_object(&o.borrow(), config, depth),
        Value::Function(f) => f.signature(),
    }
}

fn render_list<'a>(
    items: impl ExactSizeIterator<Item = &'a Value>,
    open: &str,
    close: &str,
    config: &RenderConfig,
    depth: usize,
) -> String {
    if items.len() == 0 {
        return format!("{open}{close}");
    }
    let rendered: Vec<String> = items
        .map(|v| render_at(v, config, depth + 1, true))
        .collect();
    match config.indent {
        Some(width) => {
            let pad = " ".repeat(width * (depth + 1));
            let end_pad = " ".repeat(width * depth);
            format!(
                "{open}\n{pad}{}\n{end_pad}{close}",
                rendered.join(&format!(",\n{pad}"))
            )
        }
        None => format!("{open} {} {close}", rendered.join(", ")),
    }
}

fn render_object(map: &ObjectMap, config: &RenderConfig, depth: usize) -> String {
    if map.is_empty() {
        return "{}".to_owned();
    }
    let rendered: Vec<String> = map
        .iter()
        .map(|(k, v)| {
            let key = if is_identifier(k) { k.clone() } else { quote(k) };
            format!("{key}: {}", render_at(v, config, depth + 1, true))
        })
        .collect();
    match config.indent {
        Some(width) => {
            let pad = " ".repeat(width * (depth + 1));
            let end_pad = " ".repeat(width * depth);
            format!(
                "{{\n{pad}{}\n{end_pad}}}",
                rendered.join(&format!(",\n{pad}"))
            )
        }
        None => format!("{{ {} }}", rendered.join(", ")),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Insert `,` separators into each run of four or more digits,
/// skipping any exponent or fractional part.
fn separate_thousands(text: &str) -> String {
    let (mantissa, rest) = match text.find(['.', 'e', 'E']) {
        Some(i) => text.split_at(i),
        None => (text, ""),
    };
    let (sign, digits) = match mantissa.strip_prefix('-') {
        Some(d) => ("-", d),
        None => ("", mantissa),
    };
    if digits.len() <= 3 {
        return text.to_owned();
    }
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - offset) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}{grouped}{rest}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectMap;
    use pretty_assertions::assert_eq;

    #[test]
    fn separators_group_by_threes() {
        assert_eq!(separate_thousands("1234567"), "1,234,567");
        assert_eq!(separate_thousands("-1234"), "-1,234");
        assert_eq!(separate_thousands("123"), "123");
        assert_eq!(separate_thousands("1234.5678"), "1,234.5678");
    }

    #[test]
    fn strings_quote_only_when_asked_or_nested() {
        let s = Value::string("hi \"there\"");
        assert_eq!(render(&s, &RenderConfig::plain()), "hi \"there\"");
        let quoting = RenderConfig {
            quote_strings: true,
            ..RenderConfig::plain()
        };
        assert_eq!(render(&s, &quoting), "\"hi \\\"there\\\"\"");
        let arr = Value::array(vec![Value::string("x")]);
        assert_eq!(render(&arr, &RenderConfig::plain()), "[ \"x\" ]");
    }

    #[test]
    fn object_keys_quote_when_not_identifiers() {
        let mut map = ObjectMap::new();
        map.insert("a".into(), Value::integer(1), false);
        map.insert("b c".into(), Value::integer(2), false);
        let obj = Value::object(map);
        assert_eq!(render(&obj, &RenderConfig::plain()), "{ a: 1, \"b c\": 2 }");
    }

    #[test]
    fn indented_rendering() {
        let arr = Value::array(vec![Value::integer(1), Value::integer(2)]);
        let config = RenderConfig {
            indent: Some(2),
            ..RenderConfig::plain()
        };
        assert_eq!(render(&arr, &config), "[\n  1,\n  2\n]");
    }

    #[test]
    fn fraction_sign_renders_on_the_numerator() {
        let r = Value::Fraction(num_rational::BigRational::new((-1).into(), 3.into()));
        assert_eq!(render(&r, &RenderConfig::plain()), "-1/3");
    }
}
