// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use chrono::{DateTime, Utc};

use crate::{param::reason_phrase, template::escape_html};

/// 生成框架自带的错误页与诊断页。
pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    /// `note` 为 `None` 时使用状态码的原因短语作为说明。`note` 会被转义。
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => escape_html(n),
            None => match reason_phrase(code) {
                "" => "Unknown Status".to_string(),
                phrase => phrase.to_string(),
            },
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

/// `Date` 响应头使用的 IMF-fixdate 格式
pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_html_builder_from_status_code() {
        let html = HtmlBuilder::from_status_code(404, Some("view `a.html` not found")).build();
        assert!(html.contains("404"));
        assert!(html.contains("view `a.html` not found"));
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_html_builder_no_note() {
        let html = HtmlBuilder::from_status_code(403, None).build();
        assert!(html.contains("Forbidden"));
        let html = HtmlBuilder::from_status_code(599, None).build();
        assert!(html.contains("Unknown Status"));
    }

    #[test]
    fn test_html_builder_escapes_note() {
        let html = HtmlBuilder::from_status_code(500, Some("<script>")).build();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_format_http_date() {
        let date = Utc.with_ymd_and_hms(2024, 3, 5, 8, 9, 10).unwrap();
        assert_eq!(format_http_date(&date), "Tue, 05 Mar 2024 08:09:10 GMT");
    }
}
