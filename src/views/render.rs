use serde_json::{json, Value};

use crate::{
    error::RenderError,
    models::{AlertDirection, PriceSnapshot, TriggeredMatch},
    templates::{self, Hbs},
};

/// Formats a price with thousands separators and two decimals,
/// e.g. `100000` -> `100,000.00`.
pub fn fmt_price(x: f64) -> String {
    let raw = format!("{:.2}", x.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if x < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

/// Renders user-facing notification texts in the user's language.
#[derive(Clone)]
pub struct Localizer {
    hbs: Hbs,
    default_language: String,
}

impl Localizer {
    pub fn new(default_language: &str) -> Result<Self, RenderError> {
        let default_language = if templates::LANGUAGES.contains(&default_language) {
            default_language.to_string()
        } else {
            tracing::warn!(
                "default language '{}' has no templates, using 'en'",
                default_language
            );
            "en".to_string()
        };

        Ok(Self {
            hbs: templates::build_handlebars()?,
            default_language,
        })
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Maps a language tag such as `ru-RU` onto a supported language,
    /// falling back to the default.
    pub fn resolve_language<'a>(&'a self, language: &'a str) -> &'a str {
        let primary = language.split(['-', '_']).next().unwrap_or("").trim();
        templates::LANGUAGES
            .iter()
            .copied()
            .find(|l| l.eq_ignore_ascii_case(primary))
            .unwrap_or(self.default_language.as_str())
    }

    pub fn render(&self, key: &str, language: &str, ctx: &Value) -> Result<String, RenderError> {
        let name = templates::template_name(self.resolve_language(language), key);
        self.hbs.render(&name, ctx).map_err(|e| RenderError {
            template: name,
            message: e.to_string(),
        })
    }

    pub fn alert_triggered(&self, m: &TriggeredMatch, currency: &str) -> Result<String, RenderError> {
        let a = &m.alert;
        let ctx = json!({
            "asset_symbol": a.asset.symbol().to_uppercase(),
            "asset_name": a.asset.display_name(),
            "above": a.direction == AlertDirection::Above,
            "threshold": fmt_price(a.threshold),
            "current_price": fmt_price(m.current_price),
            "currency": currency.to_uppercase(),
        });
        self.render(templates::ALERT_TRIGGERED, &a.language_preference, &ctx)
    }

    pub fn price_update(&self, snapshot: &PriceSnapshot, language: &str) -> Result<String, RenderError> {
        let prices: Vec<Value> = snapshot
            .prices()
            .iter()
            .map(|(asset, price)| {
                json!({
                    "name": asset.display_name(),
                    "price": fmt_price(*price),
                })
            })
            .collect();

        let ctx = json!({
            "currency": snapshot.currency().to_uppercase(),
            "prices": prices,
        });
        self.render(templates::PRICE_UPDATE, language, &ctx)
    }
}
