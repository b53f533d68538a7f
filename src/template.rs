// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 视图模板
//!
//! 一个刻意保持简单的占位符模板：
//! - `{{ key }}`：按点分路径在数据中查找，输出前做 HTML 转义。
//! - `{{{ key }}}`：同上，但原样输出。
//!
//! 数据是处理函数传入的任意可序列化值的 JSON 形式。找不到的键输出空串，
//! 未闭合的标签与非法的键名视为渲染错误。

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::exception::{Exception, Result};

lazy_static! {
    static ref KEY: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)*$").unwrap();
}

pub fn render(name: &str, source: &str, data: &Value) -> Result<String> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let (open, close, raw) = if after.starts_with("{{{") {
            ("{{{", "}}}", true)
        } else {
            ("{{", "}}", false)
        };
        let inner_start = open.len();
        let end = match after[inner_start..].find(close) {
            Some(end) => inner_start + end,
            None => {
                return Err(Exception::TemplateRender {
                    name: name.to_string(),
                    reason: format!(
                        "unterminated tag at byte {}",
                        source.len() - rest.len() + start
                    ),
                })
            }
        };
        let key = after[inner_start..end].trim();
        if !KEY.is_match(key) {
            return Err(Exception::TemplateRender {
                name: name.to_string(),
                reason: format!("invalid tag `{}`", key),
            });
        }

        let value = lookup(data, key).map(stringify).unwrap_or_default();
        if raw {
            out.push_str(&value);
        } else {
            out.push_str(&escape_html(&value));
        }
        rest = &after[end + close.len()..];
    }
    out.push_str(rest);
    Ok(out)
}

fn lookup<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(data, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitutes_nested_keys() {
        let data = json!({"user": {"name": "Erik", "roles": ["admin", "dev"]}, "count": 3});
        let html = render(
            "t",
            "<p>{{ user.name }} has {{count}} items, first role {{ user.roles.0 }}</p>",
            &data,
        )
        .unwrap();
        assert_eq!(html, "<p>Erik has 3 items, first role admin</p>");
    }

    #[test]
    fn test_escapes_unless_triple_braces() {
        let data = json!({"snippet": "<b>&</b>"});
        assert_eq!(render("t", "{{ snippet }}", &data).unwrap(), "&lt;b&gt;&amp;&lt;/b&gt;");
        assert_eq!(render("t", "{{{ snippet }}}", &data).unwrap(), "<b>&</b>");
    }

    #[test]
    fn test_missing_key_renders_empty() {
        assert_eq!(render("t", "[{{ nope }}]", &json!({})).unwrap(), "[]");
        assert_eq!(render("t", "[{{ a.b }}]", &json!({"a": 1})).unwrap(), "[]");
    }

    #[test]
    fn test_unterminated_tag() {
        match render("index.html", "<p>{{ name </p>", &json!({})) {
            Err(Exception::TemplateRender { name, reason }) => {
                assert_eq!(name, "index.html");
                assert!(reason.contains("unterminated"));
            }
            other => panic!("Expected TemplateRender, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_key() {
        assert!(matches!(
            render("t", "{{ a b }}", &json!({})),
            Err(Exception::TemplateRender { .. })
        ));
    }

    #[test]
    fn test_text_without_tags_is_untouched() {
        assert_eq!(render("t", "plain } text {", &json!(null)).unwrap(), "plain } text {");
    }
}
