//! Price mode and language commands.

use bynona_client::BynonaClient;
use bynona_core::{Locale, PriceMode};

use super::CommandError;
use crate::PriceModeAction;

/// Show or change the price mode.
///
/// # Errors
///
/// Returns an error if the preference cannot be stored.
#[allow(clippy::print_stdout)]
pub fn price_mode(client: &BynonaClient, action: Option<PriceModeAction>) -> Result<(), CommandError> {
    let preferences = client.preferences();
    let mode = match action {
        None => preferences.price_mode(),
        Some(PriceModeAction::Toggle) => preferences.toggle_price_mode()?,
        Some(PriceModeAction::Retail) => set_price_mode(client, PriceMode::Retail)?,
        Some(PriceModeAction::Wholesale) => set_price_mode(client, PriceMode::Wholesale)?,
    };
    println!("Price mode: {mode}");
    Ok(())
}

fn set_price_mode(client: &BynonaClient, mode: PriceMode) -> Result<PriceMode, CommandError> {
    client.preferences().set_price_mode(mode)?;
    Ok(mode)
}

/// Show or change the UI language.
///
/// # Errors
///
/// Returns an error if the preference cannot be stored.
#[allow(clippy::print_stdout)]
pub fn locale(client: &BynonaClient, locale: Option<Locale>) -> Result<(), CommandError> {
    let preferences = client.preferences();
    if let Some(locale) = locale {
        preferences.set_locale(locale)?;
    }
    let current = preferences.locale();
    let direction = if current.is_rtl() { "rtl" } else { "ltr" };
    println!("Language: {current} ({direction})");
    Ok(())
}
