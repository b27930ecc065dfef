//! Static pages shown in the browser tab during verification and login.
//!
//! Every page is a single card on the dark Kemaslah theme. Dynamic values are
//! escaped before they are placed into markup.

use axum::response::{Html, IntoResponse, Response};

const STYLE: &str = r#"<style>
    body {
        background-color: #0B1426;
        color: white;
        font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
        display: flex;
        justify-content: center;
        align-items: center;
        height: 100vh;
        margin: 0;
    }
    .card {
        background-color: #1A202C;
        padding: 50px;
        border-radius: 25px;
        text-align: center;
        box-shadow: 0 10px 30px rgba(0,0,0,0.5);
        max-width: 450px;
    }
    .icon { font-size: 60px; margin-bottom: 20px; }
    h1 { color: #3182CE; margin-bottom: 10px; font-size: 24px; }
    h1.failure { color: #E53E3E; }
    p { color: #A0AEC0; line-height: 1.6; font-size: 16px; }
    .footer { color: #718096; font-size: 12px; margin-top: 20px; }
</style>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct Page {
    tone: Tone,
    title: String,
    paragraphs: Vec<String>,
    footer: Option<String>,
}

impl Page {
    pub fn success(title: &str) -> Self {
        Self {
            tone: Tone::Success,
            title: escape(title),
            paragraphs: Vec::new(),
            footer: None,
        }
    }

    pub fn failure(title: &str, message: &str) -> Self {
        Self {
            tone: Tone::Failure,
            title: escape(title),
            paragraphs: vec![escape(message)],
            footer: None,
        }
    }

    /// Adds a paragraph of plain text.
    pub fn paragraph(mut self, text: &str) -> Self {
        self.paragraphs.push(escape(text));
        self
    }

    /// Adds a paragraph where `value` is shown in bold between `before` and `after`.
    pub fn emphasised(mut self, before: &str, value: &str, after: &str) -> Self {
        self.paragraphs
            .push(format!("{}<b>{}</b>{}", escape(before), escape(value), escape(after)));
        self
    }

    pub fn footer(mut self, text: &str) -> Self {
        self.footer = Some(escape(text));
        self
    }

    pub fn with_reference(self, code: &str) -> Self {
        let text = format!("Reference: {code}");
        self.footer(&text)
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }

    pub fn render(&self) -> String {
        let (icon, heading) = match self.tone {
            Tone::Success => ("&#x2705;", format!("<h1>{}</h1>", self.title)),
            Tone::Failure => ("&#x274C;", format!("<h1 class=\"failure\">{}</h1>", self.title)),
        };
        let body: String = self.paragraphs.iter().map(|p| format!("<p>{p}</p>")).collect();
        let footer = self
            .footer
            .as_ref()
            .map(|f| format!("<div class=\"footer\">{f}</div>"))
            .unwrap_or_default();

        format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Kemaslah</title>{STYLE}</head>\
             <body><div class=\"card\"><div class=\"icon\">{icon}</div>{heading}{body}{footer}</div></body></html>"
        )
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        Html(self.render()).into_response()
    }
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
