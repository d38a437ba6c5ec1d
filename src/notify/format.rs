// src/notify/format.rs
//! Subscriber-facing message templates.

use crate::domain::ExchangeRate;

fn currency_name(code: &str) -> &str {
    match code {
        "USD" => "Dólar",
        "EUR" => "Euro",
        other => other,
    }
}

fn price_prefix(code: &str) -> &str {
    match code {
        "BOB" => "Bs.",
        other => other,
    }
}

pub fn price_change_message(rate: &ExchangeRate) -> String {
    let (emoji, wording) = if rate.change_24h > 0.0 {
        ("📈", "subió")
    } else if rate.change_24h < 0.0 {
        ("📉", "bajó")
    } else {
        ("➡️", "se mantiene en")
    };
    let cur = price_prefix(&rate.target_currency);

    format!(
        "{emoji} {} {} {wording} {:.2}%\n\
         💰 Compra: {cur} {:.3}\n\
         💸 Venta: {cur} {:.3}\n\
         📊 Promedio: {cur} {:.3}",
        currency_name(&rate.base_currency),
        rate.category.label(),
        rate.change_percentage_24h.abs(),
        rate.buy_price,
        rate.sell_price,
        rate.average_price,
    )
}

pub fn threshold_message(rate: &ExchangeRate, threshold_percent: f64) -> String {
    let cur = price_prefix(&rate.target_currency);
    format!(
        "🚨 ¡ALERTA DE UMBRAL! 🚨\n\
         El {} {} ha superado el umbral del {threshold_percent}%\n\
         📈 Variación: {:.2}%\n\
         💰 Compra: {cur} {:.3}\n\
         💸 Venta: {cur} {:.3}",
        currency_name(&rate.base_currency).to_lowercase(),
        rate.category.label(),
        rate.change_percentage_24h,
        rate.buy_price,
        rate.sell_price,
    )
}
