//! Notification composer: resolved data to a plain-text / HTML mail body.
//!
//! Pure and deterministic. Values are written in full; the HTML form escapes
//! them, the text form carries them verbatim.

use crate::types::{AblData, PropertyUnit};
use serde::{Deserialize, Serialize};

pub const SUBJECT: &str = "Consulta de ABL";
const FOOTER: &str = "Este correo fue generado automáticamente.";

/// Links embedded in the HTML form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branding {
    pub logo_url: String,
    pub reference_url: String,
}

/// A ready-to-send notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationComposer {
    branding: Branding,
}

impl NotificationComposer {
    pub fn new(branding: Branding) -> Self {
        Self { branding }
    }

    pub fn compose(&self, data: &AblData) -> ComposedMessage {
        let (text, body) = match data {
            AblData::Units(units) => (units_text(units), units_html(units)),
            AblData::Matrix(id) => (
                format!("El número de partida es:\n{id}\n\n{FOOTER}"),
                format!(
                    "<p>El número de partida es:<br><b>{}</b></p>",
                    escape_html(id)
                ),
            ),
        };

        ComposedMessage {
            subject: SUBJECT.to_string(),
            text,
            html: self.wrap_html(&body),
        }
    }

    fn wrap_html(&self, body: &str) -> String {
        format!(
            concat!(
                "<div style=\"padding: 1rem; text-align: center;\">\n",
                "<img src=\"{logo}\" style=\"width: 100%; padding: 1rem;\" alt=\"Logo\">\n",
                "{body}\n",
                "<hr>\n",
                "<p>Puedes utilizar esta información para realizar consultas adicionales ",
                "<a href=\"{reference}\">haciendo clic acá.</a></p>\n",
                "<p style=\"margin-top: 1rem; font-size: 0.8rem; font-style: italic;\">{footer}</p>\n",
                "</div>\n",
            ),
            logo = escape_html(&self.branding.logo_url),
            body = body,
            reference = escape_html(&self.branding.reference_url),
            footer = FOOTER,
        )
    }
}

fn units_text(units: &[PropertyUnit]) -> String {
    let lines: Vec<String> = units
        .iter()
        .map(|u| format!("Partida: {}, Piso: {}, Dpto: {}", u.pdahorizontal, u.piso, u.dpto))
        .collect();
    format!("Los números de partida son:\n{}\n\n{FOOTER}", lines.join("\n"))
}

fn units_html(units: &[PropertyUnit]) -> String {
    let items: String = units
        .iter()
        .map(|u| {
            format!(
                "<li>Partida: <b>{}</b>, Piso: <b>{}</b>, Dpto: <b>{}</b></li>",
                escape_html(&u.pdahorizontal),
                escape_html(&u.piso),
                escape_html(&u.dpto)
            )
        })
        .collect();
    format!(
        "<p>Los números de partida son:</p>\n<ul style=\"text-align: left; padding-left: 2rem;\">{items}</ul>"
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer() -> NotificationComposer {
        NotificationComposer::new(Branding {
            logo_url: "https://cdn.test/logo.png".into(),
            reference_url: "https://abl.test/consulta".into(),
        })
    }

    fn unit(pda: &str, piso: &str, dpto: &str) -> PropertyUnit {
        PropertyUnit {
            pdahorizontal: pda.into(),
            piso: piso.into(),
            dpto: dpto.into(),
        }
    }

    #[test]
    fn test_matrix_message() {
        let msg = composer().compose(&AblData::Matrix("456".into()));
        assert_eq!(msg.subject, "Consulta de ABL");
        assert_eq!(
            msg.text,
            "El número de partida es:\n456\n\nEste correo fue generado automáticamente."
        );
        assert!(msg.html.contains("<b>456</b>"));
        assert!(msg.html.contains("src=\"https://cdn.test/logo.png\""));
        assert!(msg.html.contains("href=\"https://abl.test/consulta\""));
    }

    #[test]
    fn test_units_message_lists_every_unit() {
        let data = AblData::Units(vec![unit("123", "1", "A"), unit("124", "PB", "B")]);
        let msg = composer().compose(&data);
        assert_eq!(
            msg.text,
            "Los números de partida son:\n\
             Partida: 123, Piso: 1, Dpto: A\n\
             Partida: 124, Piso: PB, Dpto: B\n\n\
             Este correo fue generado automáticamente."
        );
        assert!(msg
            .html
            .contains("<li>Partida: <b>124</b>, Piso: <b>PB</b>, Dpto: <b>B</b></li>"));
        assert_eq!(msg.html.matches("<li>").count(), 2);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let data = AblData::Units(vec![unit("9", "3", "C")]);
        let c = composer();
        assert_eq!(c.compose(&data), c.compose(&data));
    }

    #[test]
    fn test_long_values_not_truncated() {
        let id = "7".repeat(4096);
        let msg = composer().compose(&AblData::Matrix(id.clone()));
        assert!(msg.text.contains(&id));
        assert!(msg.html.contains(&id));
    }

    #[test]
    fn test_markup_escaped_in_html_only() {
        let msg = composer().compose(&AblData::Units(vec![unit("<b>1</b>", "1", "A&B")]));
        assert!(msg.text.contains("Partida: <b>1</b>, Piso: 1, Dpto: A&B"));
        assert!(msg.html.contains("&lt;b&gt;1&lt;/b&gt;"));
        assert!(msg.html.contains("A&amp;B"));
    }
}
