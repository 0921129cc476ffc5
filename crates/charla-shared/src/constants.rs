/// Application name
pub const APP_NAME: &str = "Charla";

/// Country prefix (Argentina, mobile) prepended to bare local numbers
pub const COUNTRY_PREFIX: &str = "549";

/// Minimum digit count of a formatted number: 549 + 9 digits
pub const MIN_PHONE_DIGITS: usize = 12;

/// Local storage key and cookie name holding the user's phone session
pub const SESSION_KEY: &str = "whatsapp_phone";

/// Session cookie lifetime (one year)
pub const SESSION_MAX_AGE_SECS: u64 = 31_536_000;

/// Document id of the singleton admin profile
pub const ADMIN_PROFILE_ID: &str = "main";

/// First message a brand-new chat receives from the admin side
pub const WELCOME_MESSAGE: &str = "¡Hola! ¿En qué puedo ayudarte?";

/// Body of the WhatsApp verification message. `{code}` is substituted.
pub const VERIFICATION_TEMPLATE: &str =
    "Tu código de verificación para Cargatusfichas.com es: {code}";

/// Lower and upper bound (inclusive) of the 6-digit verification code
pub const VERIFICATION_CODE_MIN: u32 = 100_000;
pub const VERIFICATION_CODE_MAX: u32 = 999_999;

/// Admin statuses stay visible for this many hours
pub const STATUS_TTL_HOURS: i64 = 24;

/// Sentinels returned by timestamp formatting
pub const NO_TIME: &str = "Sin hora";
pub const NO_DATE: &str = "Sin fecha";

/// Avatar shown when a chat or profile has none
pub const DEFAULT_AVATAR: &str = "/default-avatar.png";

/// Twilio sandbox sender used when no number is configured
pub const DEFAULT_TWILIO_FROM: &str = "whatsapp:+14155238886";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Maximum text message length in bytes (64 KiB)
pub const MAX_MESSAGE_SIZE: usize = 65_536;
