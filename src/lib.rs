pub mod api;
pub mod bot;
pub mod config;
pub mod cursor;
pub mod daily;
pub mod monitor;
pub mod reporter;
pub mod state;
pub mod telegram;
pub mod types;
pub mod wallet;

/// opinion.trade open API base URL (requires `apikey` header)
pub const OPINION_API_BASE: &str = "https://openapi.opinion.trade/openapi";

/// Telegram Bot API base URL
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Moralis deep-index API base URL (BSC transaction history)
pub const MORALIS_API_BASE: &str = "https://deep-index.moralis.io/api/v2";

/// Safe proxy factory on BSC. Smart trading wallets are deployed through it,
/// so an EOA's transaction to the factory reveals its trading wallet address.
pub const SAFE_PROXY_FACTORY: &str = "0xa6B71E26C5e0845f74c812102Ca7114b6a896AB2";
