use handlebars::Handlebars;
use std::sync::Arc;

use crate::error::RenderError;

pub type Hbs = Arc<Handlebars<'static>>;

/// Languages with a full set of message templates.
pub const LANGUAGES: &[&str] = &["en", "ru"];

pub const ALERT_TRIGGERED: &str = "alert_triggered";
pub const PRICE_UPDATE: &str = "price_update";

const TEMPLATES: &[(&str, &str, &str)] = &[
    (
        "en",
        ALERT_TRIGGERED,
        include_str!("../../templates/locales/en/alert_triggered.hbs"),
    ),
    (
        "en",
        PRICE_UPDATE,
        include_str!("../../templates/locales/en/price_update.hbs"),
    ),
    (
        "ru",
        ALERT_TRIGGERED,
        include_str!("../../templates/locales/ru/alert_triggered.hbs"),
    ),
    (
        "ru",
        PRICE_UPDATE,
        include_str!("../../templates/locales/ru/price_update.hbs"),
    ),
];

/// Registered name of a message template, e.g. `en/alert_triggered`.
pub fn template_name(language: &str, key: &str) -> String {
    format!("{language}/{key}")
}

pub fn build_handlebars() -> Result<Hbs, RenderError> {
    let mut hb = Handlebars::new();
    hb.set_strict_mode(true);

    for (lang, key, source) in TEMPLATES {
        let name = template_name(lang, key);
        hb.register_template_string(&name, *source)
            .map_err(|e| RenderError {
                template: name.clone(),
                message: e.to_string(),
            })?;
    }

    Ok(Arc::new(hb))
}
