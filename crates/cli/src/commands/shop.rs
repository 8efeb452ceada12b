//! Shop commands.
//!
//! # Usage
//!
//! ```bash
//! dos-cli shop test --shop demo.myshopify.com --token shpat_...
//! dos-cli shop info
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPIFY_SHOP` - Default for `--shop`
//! - `SHOPIFY_ACCESS_TOKEN` - Default for `--token`

use secrecy::SecretString;

use super::{CommandError, client, print_json};

/// Check the connection and print the outcome.
///
/// A failed check is reported in the output and as an error.
pub async fn test(shop: &str, token: &SecretString) -> Result<(), CommandError> {
    let result = client()?.test_connection(shop, token).await;
    print_json(&result)?;

    if let Some(error) = result.error {
        return Err(CommandError::ConnectionFailed(format!("{shop}: {error}")));
    }
    tracing::info!("Connection to {shop} ok");
    Ok(())
}

/// Print shop metadata.
pub async fn info(shop: &str, token: &SecretString) -> Result<(), CommandError> {
    let shop = client()?.get_shop(shop, token).await?;
    print_json(&shop)
}
